use crate::application::reaper::WorkerExit;
use crate::application::registry::{Account, WorkerHandle};
use crate::domain::account::UserId;
use crate::domain::operation::Request;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Inbox bound. Admission caps in-flight requests per user at the backlog
/// limit, so any bound at or above it never blocks an admitted enqueue.
const INBOX_CAPACITY: usize = 16;

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(0);

/// Single-consumer task serializing all balance mutations for one user.
///
/// Spawned lazily on first demand, shuts itself down after sitting idle for
/// the configured timeout, and reports its exit to the reaper.
pub(crate) struct Worker {
    id: u64,
    user: UserId,
    account: Arc<Account>,
    inbox: mpsc::Receiver<Request>,
    idle_timeout: Duration,
    exits: mpsc::UnboundedSender<WorkerExit>,
}

impl Worker {
    /// Spawns a worker task for the user and returns its handle.
    pub(crate) fn spawn(
        user: UserId,
        account: Arc<Account>,
        idle_timeout: Duration,
        exits: mpsc::UnboundedSender<WorkerExit>,
    ) -> WorkerHandle {
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(INBOX_CAPACITY);
        let worker = Worker {
            id,
            user,
            account,
            inbox: receiver,
            idle_timeout,
            exits,
        };
        tokio::spawn(worker.run());
        WorkerHandle { id, inbox: sender }
    }

    async fn run(mut self) {
        debug!(user = %self.user, worker = self.id, "worker started");
        loop {
            let request = tokio::select! {
                request = self.inbox.recv() => request,
                _ = tokio::time::sleep(self.idle_timeout) => {
                    self.drain().await;
                    break;
                }
            };
            match request {
                Some(request) => self.handle(request).await,
                None => break,
            }
        }
        let _ = self.exits.send(WorkerExit {
            user: self.user.clone(),
            worker_id: self.id,
        });
        debug!(user = %self.user, worker = self.id, "worker stopped");
    }

    /// Graceful idle shutdown: unpublish this incarnation so no new request
    /// targets it, then run the inbox dry. Requests enqueued before the
    /// close still execute and get their replies; an enqueue that loses the
    /// race observes a closed inbox and retries against a fresh worker.
    async fn drain(&mut self) {
        self.account.clear_worker_if(self.id);
        self.inbox.close();
        while let Some(request) = self.inbox.recv().await {
            self.handle(request).await;
        }
        debug!(user = %self.user, worker = self.id, "worker drained after idle timeout");
    }

    async fn handle(&self, request: Request) {
        match request {
            Request::Deposit {
                amount,
                currency,
                reply,
            } => {
                let result = self.account.balances.deposit(&currency, amount).await;
                let _ = reply.send(result);
            }
            Request::Withdraw {
                amount,
                currency,
                reply,
            } => {
                let result = self.account.balances.withdraw(&currency, amount).await;
                let _ = reply.send(result);
            }
            Request::Balance { currency, reply } => {
                let _ = reply.send(Ok(self.account.balances.get(&currency).await));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::{Amount, Balance, Currency};
    use rust_decimal_macros::dec;
    use tokio::sync::oneshot;

    fn deposit(amount: rust_decimal::Decimal) -> (Request, oneshot::Receiver<crate::error::Result<Balance>>) {
        let (reply, response) = oneshot::channel();
        let request = Request::Deposit {
            amount: Amount::new(amount).unwrap(),
            currency: Currency::new("EUR").unwrap(),
            reply,
        };
        (request, response)
    }

    fn test_account() -> Arc<Account> {
        let registry = crate::application::registry::Registry::new();
        let user = UserId::new("u").unwrap();
        registry.create_user(user.clone()).unwrap();
        registry.lookup(&user).unwrap()
    }

    #[tokio::test]
    async fn test_requests_execute_in_fifo_order() {
        let account = test_account();
        let (exits, _exit_rx) = mpsc::unbounded_channel();
        let handle = Worker::spawn(
            UserId::new("u").unwrap(),
            Arc::clone(&account),
            Duration::from_secs(60),
            exits,
        );

        let mut responses = Vec::new();
        for value in [dec!(1.0), dec!(2.0), dec!(3.0)] {
            let (request, response) = deposit(value);
            handle.inbox.send(request).await.unwrap();
            responses.push(response);
        }

        // Cumulative balances prove the deposits applied in enqueue order.
        let mut seen = Vec::new();
        for response in responses {
            seen.push(response.await.unwrap().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                Balance::new(dec!(1.0)),
                Balance::new(dec!(3.0)),
                Balance::new(dec!(6.0)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_shuts_worker_down() {
        let account = test_account();
        let (exits, mut exit_rx) = mpsc::unbounded_channel();
        let handle = Worker::spawn(
            UserId::new("u").unwrap(),
            Arc::clone(&account),
            Duration::from_secs(5),
            exits,
        );

        let (request, response) = deposit(dec!(1.0));
        handle.inbox.send(request).await.unwrap();
        response.await.unwrap().unwrap();

        let exit = exit_rx.recv().await.unwrap();
        assert_eq!(exit.worker_id, handle.id);
        assert!(handle.inbox.is_closed());
        assert!(!account.has_worker());
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_exits_when_inbox_senders_drop() {
        let account = test_account();
        let (exits, mut exit_rx) = mpsc::unbounded_channel();
        let handle = Worker::spawn(
            UserId::new("u").unwrap(),
            Arc::clone(&account),
            Duration::from_secs(3600),
            exits,
        );

        drop(handle);
        let exit = exit_rx.recv().await.unwrap();
        assert_eq!(exit.user, UserId::new("u").unwrap());
    }
}
