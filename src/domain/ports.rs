use super::account::{Amount, Balance, Currency};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
/// Interface for a single user's per-currency holdings.
///
/// Mutations are only ever issued by the user's worker; the store outlives
/// any one worker incarnation.
pub trait BalanceStore: Send + Sync {
    /// Credits the currency and returns the new balance.
    ///
    /// Fallible by signature: deposits cannot currently fail on amount
    /// grounds, but the transfer compensation path composes over this
    /// result.
    async fn deposit(&self, currency: &Currency, amount: Amount) -> Result<Balance>;

    /// Debits the currency. Fails with `NotEnoughMoney` and leaves the
    /// balance untouched when funds are short.
    async fn withdraw(&self, currency: &Currency, amount: Amount) -> Result<Balance>;

    /// Balance of a currency. An unused currency reads as zero.
    async fn get(&self, currency: &Currency) -> Balance;

    /// Every currency held, with its balance.
    async fn snapshot(&self) -> Vec<(Currency, Balance)>;
}

pub type BalanceStoreArc = Arc<dyn BalanceStore>;
