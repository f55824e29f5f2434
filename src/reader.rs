use crate::domain::account::{Amount, Currency, UserId};
use crate::error::{BankError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of an operation script, as laid out on disk.
#[derive(Debug, Deserialize)]
struct RawOperation {
    op: String,
    user: String,
    #[serde(default)]
    counterparty: Option<String>,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
}

/// A validated banking command ready for dispatch.
#[derive(Debug)]
pub enum Command {
    Create {
        user: UserId,
    },
    Deposit {
        user: UserId,
        amount: Amount,
        currency: Currency,
    },
    Withdraw {
        user: UserId,
        amount: Amount,
        currency: Currency,
    },
    Balance {
        user: UserId,
        currency: Currency,
    },
    Send {
        from: UserId,
        to: UserId,
        amount: Amount,
        currency: Currency,
    },
}

/// Streams validated commands out of a CSV operation script.
///
/// Validation happens here, at the outer edge: malformed rows, empty
/// identifiers, and negative amounts all surface as `WrongArguments`
/// without ever reaching the core.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize().map(|row| {
            let raw: RawOperation =
                row.map_err(|error| BankError::WrongArguments(error.to_string()))?;
            Command::try_from(raw)
        })
    }
}

impl TryFrom<RawOperation> for Command {
    type Error = BankError;

    fn try_from(raw: RawOperation) -> Result<Self> {
        let user = UserId::new(raw.user)?;
        match raw.op.as_str() {
            "create" => Ok(Command::Create { user }),
            "deposit" => Ok(Command::Deposit {
                user,
                amount: require_amount(raw.amount)?,
                currency: require_currency(raw.currency)?,
            }),
            "withdraw" => Ok(Command::Withdraw {
                user,
                amount: require_amount(raw.amount)?,
                currency: require_currency(raw.currency)?,
            }),
            "balance" => Ok(Command::Balance {
                user,
                currency: require_currency(raw.currency)?,
            }),
            "send" => Ok(Command::Send {
                from: user,
                to: UserId::new(raw.counterparty.unwrap_or_default())?,
                amount: require_amount(raw.amount)?,
                currency: require_currency(raw.currency)?,
            }),
            other => Err(BankError::WrongArguments(format!(
                "unknown operation `{other}`"
            ))),
        }
    }
}

fn require_currency(raw: Option<String>) -> Result<Currency> {
    Currency::new(raw.unwrap_or_default())
}

fn require_amount(raw: Option<Decimal>) -> Result<Amount> {
    match raw {
        Some(value) => Amount::new(value),
        None => Err(BankError::WrongArguments("amount is required".into())),
    }
}
