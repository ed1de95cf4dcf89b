use crate::domain::account::Account;
use crate::domain::changeset::Changeset;
use crate::domain::earning::Earning;
use crate::domain::ids::{AccountId, EarningId, OrderId, PayoutId, WithdrawalId};
use crate::domain::ledger::{LedgerEntry, Page};
use crate::domain::payout::Payout;
use crate::domain::ports::LedgerStore;
use crate::domain::withdrawal::WithdrawalRequest;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    entries: HashMap<AccountId, Vec<LedgerEntry>>,
    orders: HashSet<OrderId>,
    earnings: HashMap<EarningId, Earning>,
    earnings_by_account: HashMap<AccountId, Vec<EarningId>>,
    payouts: HashMap<PayoutId, Payout>,
    payouts_by_account: HashMap<AccountId, Vec<PayoutId>>,
    withdrawals: HashMap<WithdrawalId, WithdrawalRequest>,
    withdrawals_by_account: HashMap<AccountId, Vec<WithdrawalId>>,
}

impl State {
    fn account_exists(&self, working: &HashMap<AccountId, Account>, id: &AccountId) -> Result<()> {
        if working.contains_key(id) || self.accounts.contains_key(id) {
            Ok(())
        } else {
            Err(LedgerError::AccountNotFound(id.to_string()))
        }
    }
}

/// A thread-safe in-memory ledger store.
///
/// All tables live behind one `Arc<RwLock<_>>`. Readers share the lock;
/// `commit` holds the write lock for validation and application, which makes
/// each changeset atomic and keeps in-flight writes invisible to readers.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn collect_by_index<K, V>(index: Option<&Vec<K>>, table: &HashMap<K, V>) -> Vec<V>
where
    K: std::hash::Hash + Eq,
    V: Clone,
{
    index
        .into_iter()
        .flatten()
        .filter_map(|id| table.get(id).cloned())
        .collect()
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        let state = self.state.read().await;
        Ok(state.accounts.get(id).cloned())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(accounts)
    }

    async fn entries(&self, id: &AccountId, page: Page) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(page.apply(state.entries.get(id).into_iter().flatten().cloned()))
    }

    async fn order_recorded(&self, order: &OrderId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.orders.contains(order))
    }

    async fn earnings(&self, id: &AccountId) -> Result<Vec<Earning>> {
        let state = self.state.read().await;
        Ok(collect_by_index(
            state.earnings_by_account.get(id),
            &state.earnings,
        ))
    }

    async fn payout(&self, id: PayoutId) -> Result<Option<Payout>> {
        let state = self.state.read().await;
        Ok(state.payouts.get(&id).cloned())
    }

    async fn payouts(&self, id: &AccountId) -> Result<Vec<Payout>> {
        let state = self.state.read().await;
        Ok(collect_by_index(
            state.payouts_by_account.get(id),
            &state.payouts,
        ))
    }

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        let state = self.state.read().await;
        Ok(state.withdrawals.get(&id).cloned())
    }

    async fn withdrawals(&self, id: &AccountId) -> Result<Vec<WithdrawalRequest>> {
        let state = self.state.read().await;
        Ok(collect_by_index(
            state.withdrawals_by_account.get(id),
            &state.withdrawals,
        ))
    }

    async fn commit(&self, changes: Changeset) -> Result<Vec<LedgerEntry>> {
        let mut state = self.state.write().await;

        // Validate everything before touching state.
        if let Some(order) = &changes.order
            && state.orders.contains(order)
        {
            return Err(LedgerError::DuplicateOrderEarnings(order.to_string()));
        }
        for write in &changes.earnings {
            let current = state.earnings.get(&write.record.id).map(|e| e.state);
            write.check("earning", write.record.id, current)?;
        }
        for write in &changes.payouts {
            let current = state.payouts.get(&write.record.id).map(|p| p.state);
            write.check("payout", write.record.id, current)?;
        }
        for write in &changes.withdrawals {
            let current = state.withdrawals.get(&write.record.id).map(|w| w.state);
            write.check("withdrawal", write.record.id, current)?;
        }

        let mut working: HashMap<AccountId, Account> = changes
            .touched_accounts()
            .into_iter()
            .filter_map(|id| state.accounts.get(&id).cloned().map(|a| (id, a)))
            .collect();
        let entries = changes.post_entries(&mut working)?;

        for id in changes
            .earnings
            .iter()
            .map(|w| &w.record.account_id)
            .chain(changes.payouts.iter().map(|w| &w.record.account_id))
            .chain(changes.withdrawals.iter().map(|w| &w.record.account_id))
        {
            state.account_exists(&working, id)?;
        }

        // Apply. Nothing below can fail.
        let state = &mut *state;
        state.accounts.extend(working);
        for entry in &entries {
            state
                .entries
                .entry(entry.account_id.clone())
                .or_default()
                .push(entry.clone());
        }
        if let Some(order) = changes.order {
            state.orders.insert(order);
        }
        for write in changes.earnings {
            let earning = write.record;
            if write.expected.is_none() {
                state
                    .earnings_by_account
                    .entry(earning.account_id.clone())
                    .or_default()
                    .push(earning.id);
            }
            state.earnings.insert(earning.id, earning);
        }
        for write in changes.payouts {
            let payout = write.record;
            if write.expected.is_none() {
                state
                    .payouts_by_account
                    .entry(payout.account_id.clone())
                    .or_default()
                    .push(payout.id);
            }
            state.payouts.insert(payout.id, payout);
        }
        for write in changes.withdrawals {
            let request = write.record;
            if write.expected.is_none() {
                state
                    .withdrawals_by_account
                    .entry(request.account_id.clone())
                    .or_default()
                    .push(request.id);
            }
            state.withdrawals.insert(request.id, request);
        }

        Ok(entries)
    }
}
