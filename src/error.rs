use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BankError>;

/// Every outcome a banking operation can fail with.
///
/// Existence checks run before admission, so their failures never touch a
/// backlog counter. Transfer admission failures carry the per-side variants
/// instead of the plain ones.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum BankError {
    #[error("wrong arguments: {0}")]
    #[diagnostic(
        code(teller::wrong_arguments),
        help("identifiers must be non-empty and amounts non-negative")
    )]
    WrongArguments(String),

    #[error("user already exists")]
    #[diagnostic(code(teller::user_already_exists))]
    UserAlreadyExists,

    #[error("user does not exist")]
    #[diagnostic(code(teller::user_does_not_exist))]
    UserDoesNotExist,

    #[error("not enough money")]
    #[diagnostic(code(teller::not_enough_money))]
    NotEnoughMoney,

    #[error("too many requests to user")]
    #[diagnostic(code(teller::too_many_requests))]
    TooManyRequestsToUser,

    #[error("sender does not exist")]
    #[diagnostic(code(teller::sender_does_not_exist))]
    SenderDoesNotExist,

    #[error("receiver does not exist")]
    #[diagnostic(code(teller::receiver_does_not_exist))]
    ReceiverDoesNotExist,

    #[error("too many requests to sender")]
    #[diagnostic(code(teller::too_many_requests_to_sender))]
    TooManyRequestsToSender,

    #[error("too many requests to receiver")]
    #[diagnostic(code(teller::too_many_requests_to_receiver))]
    TooManyRequestsToReceiver,

    /// Channel plumbing failure. Not reachable through normal operation:
    /// a draining worker triggers one retry against a fresh worker, and a
    /// fresh worker's inbox is always open.
    #[error("internal error: {0}")]
    #[diagnostic(code(teller::internal))]
    Internal(String),
}
