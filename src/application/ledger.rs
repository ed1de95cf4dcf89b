use super::events::{EventPublisher, LedgerEvent};
use crate::domain::changeset::Changeset;
use crate::domain::ids::AccountId;
use crate::domain::ledger::{Direction, LedgerEntry, Page, PendingEntry, ReasonCode};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::LedgerStoreRef;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Serialize;

/// Outcome of re-deriving an account from its entry log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconciliationReport {
    pub account_id: AccountId,
    pub cached_balance: Balance,
    pub derived_balance: Balance,
    pub cached_sequence: u64,
    pub entry_count: u64,
    /// Sequences whose recorded `balance_after` disagrees with the running sum,
    /// or that are out of order.
    pub broken_sequences: Vec<u64>,
    /// The running sum went below zero at some point.
    pub went_negative: bool,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.cached_balance == self.derived_balance
            && self.cached_sequence == self.entry_count
            && self.broken_sequences.is_empty()
            && !self.went_negative
    }
}

/// The Ledger Store contract: append entries, read balances and history.
#[derive(Clone)]
pub struct LedgerService {
    store: LedgerStoreRef,
    events: EventPublisher,
}

impl LedgerService {
    pub fn new(store: LedgerStoreRef, events: EventPublisher) -> Self {
        Self { store, events }
    }

    /// Appends one entry to an existing account.
    ///
    /// The balance check for debits happens inside the store commit, so it
    /// cannot race with another writer.
    pub async fn record_entry(
        &self,
        account_id: &AccountId,
        direction: Direction,
        amount: Decimal,
        reason: ReasonCode,
        reference_id: &str,
    ) -> Result<LedgerEntry> {
        let amount = Amount::new(amount)?;
        let pending = PendingEntry {
            account_id: account_id.clone(),
            direction,
            amount,
            reason,
            reference_id: reference_id.to_string(),
        };

        let entry = self
            .store
            .commit(Changeset::new().post(pending))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Storage("commit returned no entry".to_string()))?;

        tracing::info!(
            account = %entry.account_id,
            direction = %entry.direction,
            amount = %entry.amount,
            reason = %entry.reason,
            sequence = entry.sequence,
            "ledger entry recorded"
        );
        self.events.publish(LedgerEvent::EntryRecorded(entry.clone()));
        Ok(entry)
    }

    pub async fn balance(&self, account_id: &AccountId) -> Result<Balance> {
        self.store
            .account(account_id)
            .await?
            .map(|account| account.balance)
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    pub async fn list_entries(&self, account_id: &AccountId, page: Page) -> Result<Vec<LedgerEntry>> {
        if self.store.account(account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id.to_string()));
        }
        self.store.entries(account_id, page).await
    }

    /// Re-derives balance and sequence of one account from its entries.
    pub async fn reconcile(&self, account_id: &AccountId) -> Result<ReconciliationReport> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        let entries = self.store.entries(account_id, Page::all()).await?;

        let mut running = Decimal::ZERO;
        let mut broken_sequences = Vec::new();
        let mut went_negative = false;
        for (index, entry) in entries.iter().enumerate() {
            running = running.checked_add(entry.signed_amount()).ok_or_else(|| {
                LedgerError::Storage(format!(
                    "entry log of {account_id} overflows at sequence {}",
                    entry.sequence
                ))
            })?;
            went_negative |= running < Decimal::ZERO;
            if entry.sequence != index as u64 + 1 || entry.balance_after.value() != running {
                broken_sequences.push(entry.sequence);
            }
        }

        let report = ReconciliationReport {
            account_id: account.id,
            cached_balance: account.balance,
            derived_balance: Balance::new(running),
            cached_sequence: account.last_sequence,
            entry_count: entries.len() as u64,
            broken_sequences,
            went_negative,
        };
        if report.is_consistent() {
            tracing::debug!(account = %report.account_id, balance = %report.derived_balance, "account reconciled");
        } else {
            tracing::error!(
                account = %report.account_id,
                cached = %report.cached_balance,
                derived = %report.derived_balance,
                "balance drift detected"
            );
        }
        Ok(report)
    }

    pub async fn reconcile_all(&self) -> Result<Vec<ReconciliationReport>> {
        let mut reports = Vec::new();
        for account in self.store.accounts().await? {
            reports.push(self.reconcile(&account.id).await?);
        }
        Ok(reports)
    }
}
