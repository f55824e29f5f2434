use crate::domain::account::UserId;
use crate::domain::operation::Request;
use crate::domain::ports::BalanceStoreArc;
use crate::error::{BankError, Result};
use crate::infrastructure::in_memory::InMemoryBalances;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Upper bound on in-flight requests admitted per user.
pub(crate) const MAX_BACKLOG: u32 = 10;

/// Handle to a live worker incarnation. The id disambiguates incarnations,
/// so a stale shutdown never clears a freshly installed handle.
#[derive(Clone)]
pub(crate) struct WorkerHandle {
    pub(crate) id: u64,
    pub(crate) inbox: mpsc::Sender<Request>,
}

/// Per-user record: backlog counter, worker slot, balance store.
///
/// The record is created on `create_user` and never removed; workers come
/// and go, the store and the counter persist across their lifetimes.
pub(crate) struct Account {
    backlog: AtomicU32,
    worker: Mutex<Option<WorkerHandle>>,
    pub(crate) balances: BalanceStoreArc,
}

impl Account {
    fn new() -> Self {
        Self {
            backlog: AtomicU32::new(0),
            worker: Mutex::new(None),
            balances: Arc::new(InMemoryBalances::new()),
        }
    }

    /// Admits one request if fewer than `MAX_BACKLOG` are in flight.
    ///
    /// The bound is compared before the increment, so the counter never
    /// observably exceeds the cap: of N racing admissions against a fresh
    /// counter, exactly `min(N, 10)` succeed.
    pub(crate) fn try_admit(&self) -> bool {
        let mut current = self.backlog.load(Ordering::Acquire);
        loop {
            if current >= MAX_BACKLOG {
                return false;
            }
            match self.backlog.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Releases one admitted request. Floors at zero.
    pub(crate) fn release(&self) {
        let mut current = self.backlog.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return;
            }
            match self.backlog.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    pub(crate) fn backlog(&self) -> u32 {
        self.backlog.load(Ordering::Acquire)
    }

    /// Returns the resident worker handle, installing the one produced by
    /// `spawn` when the slot is vacant. The slot is trusted as-is: a handle
    /// whose worker already died is detected at enqueue time and retired
    /// through [`clear_worker_if`](Self::clear_worker_if).
    pub(crate) fn worker_or_install(
        &self,
        spawn: impl FnOnce() -> WorkerHandle,
    ) -> WorkerHandle {
        let mut slot = self.worker.lock();
        if let Some(handle) = slot.as_ref() {
            return handle.clone();
        }
        let handle = spawn();
        *slot = Some(handle.clone());
        handle
    }

    /// Clears the slot only while it still holds the given incarnation.
    pub(crate) fn clear_worker_if(&self, id: u64) {
        let mut slot = self.worker.lock();
        if slot.as_ref().is_some_and(|handle| handle.id == id) {
            *slot = None;
        }
    }

    /// Clears the slot if the resident worker's inbox has shut. Returns
    /// whether anything was cleared.
    pub(crate) fn clear_worker_if_closed(&self) -> bool {
        let mut slot = self.worker.lock();
        if slot.as_ref().is_some_and(|handle| handle.inbox.is_closed()) {
            *slot = None;
            return true;
        }
        false
    }

    pub(crate) fn has_worker(&self) -> bool {
        self.worker.lock().is_some()
    }
}

/// Process-wide mapping from user id to account record.
pub(crate) struct Registry {
    accounts: DashMap<UserId, Arc<Account>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Atomic insert-if-absent. The loser of a concurrent race for the same
    /// id gets `UserAlreadyExists`.
    pub(crate) fn create_user(&self, user: UserId) -> Result<()> {
        match self.accounts.entry(user) {
            Entry::Occupied(_) => Err(BankError::UserAlreadyExists),
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(Account::new()));
                Ok(())
            }
        }
    }

    pub(crate) fn lookup(&self, user: &UserId) -> Result<Arc<Account>> {
        self.accounts
            .get(user)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(BankError::UserDoesNotExist)
    }

    pub(crate) fn for_each(&self, mut visit: impl FnMut(&UserId, &Arc<Account>)) {
        for entry in self.accounts.iter() {
            visit(entry.key(), entry.value());
        }
    }
}
