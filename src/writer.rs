use crate::domain::account::{Balance, Currency, UserId};
use crate::error::{BankError, Result};
use std::io::Write;

/// Writes a final statement as CSV: one row per (user, currency) holding.
pub struct StatementWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> StatementWriter<W> {
    pub fn new(target: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(target),
        }
    }

    pub fn write_statement(
        &mut self,
        rows: impl IntoIterator<Item = (UserId, Currency, Balance)>,
    ) -> Result<()> {
        self.writer
            .write_record(["user", "currency", "balance"])
            .map_err(sink_error)?;
        for (user, currency, balance) in rows {
            self.writer
                .write_record([user.as_str(), currency.as_str(), &balance.to_string()])
                .map_err(sink_error)?;
        }
        self.writer
            .flush()
            .map_err(|error| BankError::Internal(error.to_string()))?;
        Ok(())
    }
}

fn sink_error(error: csv::Error) -> BankError {
    BankError::Internal(error.to_string())
}
