use super::ids::{AccountId, EntryId};
use super::money::{Amount, Balance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => f.write_str("credit"),
            Direction::Debit => f.write_str("debit"),
        }
    }
}

/// Why a ledger entry was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReasonCode {
    OrderEarning,
    PayoutSettlement,
    WithdrawalDebit,
    AdminAdjustment,
}

impl ReasonCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::OrderEarning => "order-earning",
            ReasonCode::PayoutSettlement => "payout-settlement",
            ReasonCode::WithdrawalDebit => "withdrawal-debit",
            ReasonCode::AdminAdjustment => "admin-adjustment",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "order-earning" => Ok(ReasonCode::OrderEarning),
            "payout-settlement" => Ok(ReasonCode::PayoutSettlement),
            "withdrawal-debit" => Ok(ReasonCode::WithdrawalDebit),
            "admin-adjustment" => Ok(ReasonCode::AdminAdjustment),
            other => Err(format!("unknown reason code: {other}")),
        }
    }
}

/// An entry staged in a changeset, not yet sequenced or applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub account_id: AccountId,
    pub direction: Direction,
    pub amount: Amount,
    pub reason: ReasonCode,
    pub reference_id: String,
}

impl PendingEntry {
    pub fn credit(
        account_id: AccountId,
        amount: Amount,
        reason: ReasonCode,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            direction: Direction::Credit,
            amount,
            reason,
            reference_id: reference_id.into(),
        }
    }

    pub fn debit(
        account_id: AccountId,
        amount: Amount,
        reason: ReasonCode,
        reference_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            direction: Direction::Debit,
            amount,
            reason,
            reference_id: reference_id.into(),
        }
    }
}

/// Immutable record of one balance change.
///
/// `sequence` is assigned by the store at commit time and totally orders the
/// entries of one account. `balance_after` is the account balance once this
/// entry is applied, i.e. the sum of entries `1..=sequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub sequence: u64,
    pub direction: Direction,
    pub amount: Amount,
    pub reason: ReasonCode,
    pub reference_id: String,
    pub balance_after: Balance,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed effect of the entry on the balance.
    pub fn signed_amount(&self) -> rust_decimal::Decimal {
        match self.direction {
            Direction::Credit => self.amount.value(),
            Direction::Debit => -self.amount.value(),
        }
    }
}

/// Offset/limit window over an account's entries, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn all() -> Self {
        Self {
            offset: 0,
            limit: usize::MAX,
        }
    }

    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, 50)
    }
}
