use super::account::Account;
use super::changeset::Changeset;
use super::earning::Earning;
use super::ids::{AccountId, OrderId, PayoutId, WithdrawalId};
use super::ledger::{LedgerEntry, Page};
use super::payout::Payout;
use super::withdrawal::WithdrawalRequest;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Durable state of the engine.
///
/// Reads only ever observe committed changesets. `commit` is the single write
/// path: it validates every guard and posts every entry under one lock and
/// applies all of it or nothing.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn account(&self, id: &AccountId) -> Result<Option<Account>>;
    async fn accounts(&self) -> Result<Vec<Account>>;

    /// Entries of one account ordered by sequence.
    async fn entries(&self, id: &AccountId, page: Page) -> Result<Vec<LedgerEntry>>;

    async fn order_recorded(&self, order: &OrderId) -> Result<bool>;

    /// Earnings of one account, oldest first.
    async fn earnings(&self, id: &AccountId) -> Result<Vec<Earning>>;

    async fn payout(&self, id: PayoutId) -> Result<Option<Payout>>;
    /// Payouts of one account, oldest first.
    async fn payouts(&self, id: &AccountId) -> Result<Vec<Payout>>;

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>>;
    /// Withdrawal requests of one account, oldest first.
    async fn withdrawals(&self, id: &AccountId) -> Result<Vec<WithdrawalRequest>>;

    /// Atomically applies a changeset, returning the entries it posted.
    async fn commit(&self, changes: Changeset) -> Result<Vec<LedgerEntry>>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
