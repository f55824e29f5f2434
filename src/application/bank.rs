use crate::application::reaper::{Reaper, WorkerExit};
use crate::application::registry::{Account, Registry, WorkerHandle};
use crate::application::worker::Worker;
use crate::config::CoreConfig;
use crate::domain::account::{Amount, Balance, Currency, UserId};
use crate::domain::operation::{Reply, Request};
use crate::error::{BankError, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// The public banking API.
///
/// Each call runs existence check, backlog admission, enqueue to the user's
/// worker, reply await, and backlog release, in that order. Per user, the
/// order in which requests pass admission is the order in which they reach
/// the worker and execute.
///
/// Must be created inside a Tokio runtime; it spawns the reaper task and,
/// lazily, one worker task per active user.
pub struct Bank {
    registry: Arc<Registry>,
    config: CoreConfig,
    exits: mpsc::UnboundedSender<WorkerExit>,
}

impl Bank {
    pub fn new(config: CoreConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let exits = Reaper::spawn(Arc::clone(&registry), config.stale_check_interval);
        Self {
            registry,
            config,
            exits,
        }
    }

    /// Registers a new user with no holdings.
    pub fn create_user(&self, user: UserId) -> Result<()> {
        self.registry.create_user(user)
    }

    /// Credits the user and returns the new balance.
    pub async fn deposit(
        &self,
        user: &UserId,
        amount: Amount,
        currency: Currency,
    ) -> Result<Balance> {
        let account = self.registry.lookup(user)?;
        self.run_single(user, &account, |reply| Request::Deposit {
            amount,
            currency,
            reply,
        })
        .await
    }

    /// Debits the user, failing with `NotEnoughMoney` when funds are short.
    pub async fn withdraw(
        &self,
        user: &UserId,
        amount: Amount,
        currency: Currency,
    ) -> Result<Balance> {
        let account = self.registry.lookup(user)?;
        self.run_single(user, &account, |reply| Request::Withdraw {
            amount,
            currency,
            reply,
        })
        .await
    }

    /// Reads the user's balance in a currency. Reads are serialized through
    /// the worker like writes and contend for the same backlog cap.
    pub async fn balance(&self, user: &UserId, currency: Currency) -> Result<Balance> {
        let account = self.registry.lookup(user)?;
        self.run_single(user, &account, |reply| Request::Balance { currency, reply })
            .await
    }

    /// Moves `amount` from one user to another: withdraw on the sender's
    /// worker, then deposit on the receiver's, with both backlogs admitted
    /// up front. Returns the new sender and receiver balances.
    ///
    /// The pair is not atomic: an observer may see the debit before the
    /// credit. If the credit fails the debited funds are redeposited.
    /// A self-transfer is allowed, costs two backlog slots, and returns the
    /// final (net-zero) balance for both sides.
    pub async fn send(
        &self,
        from: &UserId,
        to: &UserId,
        amount: Amount,
        currency: Currency,
    ) -> Result<(Balance, Balance)> {
        let sender = self
            .registry
            .lookup(from)
            .map_err(|_| BankError::SenderDoesNotExist)?;
        let receiver = self
            .registry
            .lookup(to)
            .map_err(|_| BankError::ReceiverDoesNotExist)?;

        if !sender.try_admit() {
            return Err(BankError::TooManyRequestsToSender);
        }
        if !receiver.try_admit() {
            sender.release();
            return Err(BankError::TooManyRequestsToReceiver);
        }

        let result = self
            .transfer(from, &sender, to, &receiver, amount, currency)
            .await;

        receiver.release();
        sender.release();
        result
    }

    /// Read-only snapshot of every user's holdings, sorted by user then
    /// currency. Bypasses the per-user workers; meant for end-of-run
    /// reporting, not for racing against live traffic.
    pub async fn statement(&self) -> Vec<(UserId, Currency, Balance)> {
        let mut accounts = Vec::new();
        self.registry.for_each(|user, account| {
            accounts.push((user.clone(), Arc::clone(&account.balances)));
        });

        let mut rows = Vec::new();
        for (user, balances) in accounts {
            for (currency, balance) in balances.snapshot().await {
                rows.push((user.clone(), currency, balance));
            }
        }
        rows.sort();
        rows
    }

    /// Number of users with a live worker task.
    pub fn active_workers(&self) -> usize {
        let mut live = 0;
        self.registry.for_each(|_, account| {
            if account.has_worker() {
                live += 1;
            }
        });
        live
    }

    /// Admission, dispatch, release for a single-user operation.
    async fn run_single(
        &self,
        user: &UserId,
        account: &Arc<Account>,
        request: impl FnOnce(Reply) -> Request,
    ) -> Result<Balance> {
        if !account.try_admit() {
            return Err(BankError::TooManyRequestsToUser);
        }
        let result = self.dispatch(user, account, request).await;
        account.release();
        result
    }

    /// Withdraw-then-deposit with a compensating redeposit when the deposit
    /// stage fails. Runs with both backlogs already admitted; the caller
    /// releases them.
    async fn transfer(
        &self,
        from: &UserId,
        sender: &Arc<Account>,
        to: &UserId,
        receiver: &Arc<Account>,
        amount: Amount,
        currency: Currency,
    ) -> Result<(Balance, Balance)> {
        let from_balance = self
            .dispatch(from, sender, |reply| Request::Withdraw {
                amount,
                currency: currency.clone(),
                reply,
            })
            .await?;

        let deposited = self
            .dispatch(to, receiver, |reply| Request::Deposit {
                amount,
                currency: currency.clone(),
                reply,
            })
            .await;

        match deposited {
            Ok(to_balance) if from == to => Ok((to_balance, to_balance)),
            Ok(to_balance) => Ok((from_balance, to_balance)),
            Err(error) => {
                // Deposits cannot currently fail on amount grounds, but if
                // one ever does, the withdrawn funds must go back.
                if let Err(redeposit) = self
                    .dispatch(from, sender, |reply| Request::Deposit {
                        amount,
                        currency,
                        reply,
                    })
                    .await
                {
                    warn!(user = %from, error = %redeposit, "transfer compensation failed");
                }
                Err(error)
            }
        }
    }

    /// Enqueues a request on the user's worker and awaits the reply.
    ///
    /// An enqueue that hits a draining or dead worker retires that exact
    /// incarnation and retries exactly once against a freshly installed one.
    async fn dispatch(
        &self,
        user: &UserId,
        account: &Arc<Account>,
        request: impl FnOnce(Reply) -> Request,
    ) -> Result<Balance> {
        let (reply, response) = oneshot::channel();
        let mut pending = request(reply);
        let mut attempts = 0;
        loop {
            let worker = self.obtain_worker(user, account);
            match worker.inbox.send(pending).await {
                Ok(()) => {
                    return response
                        .await
                        .map_err(|_| BankError::Internal("worker dropped the reply".into()))?;
                }
                Err(mpsc::error::SendError(returned)) => {
                    account.clear_worker_if(worker.id);
                    attempts += 1;
                    if attempts > 1 {
                        return Err(BankError::Internal(
                            "worker inbox closed twice in a row".into(),
                        ));
                    }
                    warn!(user = %user, worker = worker.id, "worker inbox closed mid-enqueue, retrying once");
                    pending = returned;
                }
            }
        }
    }

    fn obtain_worker(&self, user: &UserId, account: &Arc<Account>) -> WorkerHandle {
        let user = user.clone();
        let account_ref = Arc::clone(account);
        let idle_timeout = self.config.stale_handler_timeout;
        let exits = self.exits.clone();
        account.worker_or_install(move || Worker::spawn(user, account_ref, idle_timeout, exits))
    }
}
