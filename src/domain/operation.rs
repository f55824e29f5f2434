use crate::domain::account::{Amount, Balance, Currency};
use crate::error::Result;
use tokio::sync::oneshot;

/// Single-use reply channel embedded in each request.
pub(crate) type Reply = oneshot::Sender<Result<Balance>>;

/// Requests delivered to a user's worker over its inbox. The worker answers
/// every request on its embedded reply channel, including while draining.
#[derive(Debug)]
pub(crate) enum Request {
    Deposit {
        amount: Amount,
        currency: Currency,
        reply: Reply,
    },
    Withdraw {
        amount: Amount,
        currency: Currency,
        reply: Reply,
    },
    Balance {
        currency: Currency,
        reply: Reply,
    },
}
