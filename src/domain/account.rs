use super::ids::{AccountId, EntryId};
use super::ledger::{Direction, LedgerEntry, PendingEntry};
use super::money::Balance;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ledger identity of a payable party.
///
/// `balance` and `last_sequence` are a materialised cache of the entry log.
/// They are only ever changed through [`Account::post`], which the store calls
/// while applying a committed changeset.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Account {
    pub id: AccountId,
    pub owner_id: String,
    pub currency: String,
    pub balance: Balance,
    pub last_sequence: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: AccountId, owner_id: impl Into<String>, currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_id: owner_id.into(),
            currency: currency.into(),
            balance: Balance::ZERO,
            last_sequence: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a staged entry, returning the sequenced immutable record.
    ///
    /// Debits that exceed the current balance, and credits that would
    /// overflow it, are refused and leave the account untouched.
    pub fn post(&mut self, pending: PendingEntry) -> Result<LedgerEntry, LedgerError> {
        let balance_after = match pending.direction {
            Direction::Credit => self.balance.credit(pending.amount)?,
            Direction::Debit => self.balance.debit(pending.amount).ok_or_else(|| {
                LedgerError::InsufficientBalance {
                    account: self.id.to_string(),
                    requested: pending.amount.value(),
                    available: self.balance.value(),
                }
            })?,
        };

        let now = Utc::now();
        self.balance = balance_after;
        self.last_sequence += 1;
        self.updated_at = now;

        Ok(LedgerEntry {
            id: EntryId::new(),
            account_id: self.id.clone(),
            sequence: self.last_sequence,
            direction: pending.direction,
            amount: pending.amount,
            reason: pending.reason,
            reference_id: pending.reference_id,
            balance_after,
            created_at: now,
        })
    }
}
