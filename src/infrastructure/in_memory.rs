use crate::domain::account::{Amount, Balance, Currency};
use crate::domain::ports::BalanceStore;
use crate::error::{BankError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory per-currency holdings for one user.
///
/// The lock is per user, and writes only arrive from that user's worker, so
/// contention is between the worker and read-only snapshots.
#[derive(Default)]
pub struct InMemoryBalances {
    holdings: RwLock<HashMap<Currency, Decimal>>,
}

impl InMemoryBalances {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalances {
    async fn deposit(&self, currency: &Currency, amount: Amount) -> Result<Balance> {
        let mut holdings = self.holdings.write().await;
        let current = holdings.get(currency).copied().unwrap_or(Decimal::ZERO);
        let next = current + amount.value();
        holdings.insert(currency.clone(), next);
        Ok(Balance::new(next))
    }

    async fn withdraw(&self, currency: &Currency, amount: Amount) -> Result<Balance> {
        let mut holdings = self.holdings.write().await;
        let current = holdings.get(currency).copied().unwrap_or(Decimal::ZERO);
        if current < amount.value() {
            return Err(BankError::NotEnoughMoney);
        }
        let next = current - amount.value();
        holdings.insert(currency.clone(), next);
        Ok(Balance::new(next))
    }

    async fn get(&self, currency: &Currency) -> Balance {
        let holdings = self.holdings.read().await;
        Balance::new(holdings.get(currency).copied().unwrap_or(Decimal::ZERO))
    }

    async fn snapshot(&self) -> Vec<(Currency, Balance)> {
        let holdings = self.holdings.read().await;
        let mut entries: Vec<_> = holdings
            .iter()
            .map(|(currency, value)| (currency.clone(), Balance::new(*value)))
            .collect();
        entries.sort();
        entries
    }
}
