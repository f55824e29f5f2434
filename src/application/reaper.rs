use crate::application::registry::Registry;
use crate::domain::account::UserId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Notification a worker emits when its task finishes.
pub(crate) struct WorkerExit {
    pub(crate) user: UserId,
    pub(crate) worker_id: u64,
}

/// Clears terminated workers' registry bookkeeping.
///
/// Exit events cover graceful shutdown; the periodic sweep covers workers
/// that died without reporting (panic, runtime teardown). Clearing is
/// always conditional on the exact incarnation, so a reap racing with a
/// fresh install never removes the new handle. Balances and backlog
/// counters are never touched.
pub(crate) struct Reaper {
    registry: Arc<Registry>,
    exits: mpsc::UnboundedReceiver<WorkerExit>,
    sweep_interval: Duration,
}

impl Reaper {
    /// Spawns the reaper task and returns the sender workers report to.
    /// The task ends once every sender is gone.
    pub(crate) fn spawn(
        registry: Arc<Registry>,
        sweep_interval: Duration,
    ) -> mpsc::UnboundedSender<WorkerExit> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let reaper = Reaper {
            registry,
            exits: receiver,
            sweep_interval,
        };
        tokio::spawn(reaper.run());
        sender
    }

    async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                exit = self.exits.recv() => match exit {
                    Some(exit) => self.reap(exit),
                    None => break,
                },
                _ = sweep.tick() => self.sweep(),
            }
        }
        debug!("reaper stopped");
    }

    fn reap(&self, exit: WorkerExit) {
        if let Ok(account) = self.registry.lookup(&exit.user) {
            account.clear_worker_if(exit.worker_id);
            debug!(user = %exit.user, worker = exit.worker_id, "reaped worker");
        }
    }

    fn sweep(&self) {
        let mut cleared = 0usize;
        self.registry.for_each(|user, account| {
            if account.clear_worker_if_closed() {
                debug!(user = %user, "cleared dead worker during sweep");
                cleared += 1;
            }
        });
        if cleared > 0 {
            debug!(cleared, "reaper sweep finished");
        }
    }
}
