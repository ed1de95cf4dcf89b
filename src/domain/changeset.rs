//! The unit of work every mutating operation hands to the store.
//!
//! A [`Changeset`] is validated and applied by [`LedgerStore::commit`] as one
//! atomic step: either every record and entry in it becomes visible, or none
//! does.
//!
//! [`LedgerStore::commit`]: super::ports::LedgerStore::commit

use super::account::Account;
use super::earning::{Earning, EarningState};
use super::ids::{AccountId, OrderId};
use super::ledger::{LedgerEntry, PendingEntry};
use super::payout::{Payout, PayoutState};
use super::withdrawal::{WithdrawalRequest, WithdrawalState};
use crate::error::{LedgerError, Result};
use std::collections::HashMap;
use std::fmt::Display;

/// A record write guarded by the state the writer last observed.
///
/// `expected == None` means the record must not exist yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Guarded<T, S> {
    pub record: T,
    pub expected: Option<S>,
}

impl<T, S: PartialEq + Display> Guarded<T, S> {
    /// Compare-and-swap check against the currently stored state.
    pub fn check(&self, kind: &str, id: impl Display, current: Option<S>) -> Result<()> {
        match (&self.expected, current) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(LedgerError::Conflict(format!("{kind} {id} already exists"))),
            (Some(_), None) => Err(LedgerError::Conflict(format!("{kind} {id} does not exist"))),
            (Some(expected), Some(current)) if *expected == current => Ok(()),
            (Some(expected), Some(current)) => Err(LedgerError::Conflict(format!(
                "{kind} {id} is {current}, expected {expected}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Changeset {
    /// Order whose earnings are being recorded; must not have been seen before.
    pub order: Option<OrderId>,
    /// Accounts to create if they do not exist yet.
    pub accounts: Vec<Account>,
    pub earnings: Vec<Guarded<Earning, EarningState>>,
    pub payouts: Vec<Guarded<Payout, PayoutState>>,
    pub withdrawals: Vec<Guarded<WithdrawalRequest, WithdrawalState>>,
    /// Entries to post, in order.
    pub entries: Vec<PendingEntry>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_order(mut self, order: OrderId) -> Self {
        self.order = Some(order);
        self
    }

    pub fn open_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    pub fn insert_earning(mut self, earning: Earning) -> Self {
        self.earnings.push(Guarded {
            record: earning,
            expected: None,
        });
        self
    }

    pub fn update_earning(mut self, earning: Earning, expected: EarningState) -> Self {
        self.earnings.push(Guarded {
            record: earning,
            expected: Some(expected),
        });
        self
    }

    pub fn insert_payout(mut self, payout: Payout) -> Self {
        self.payouts.push(Guarded {
            record: payout,
            expected: None,
        });
        self
    }

    pub fn update_payout(mut self, payout: Payout, expected: PayoutState) -> Self {
        self.payouts.push(Guarded {
            record: payout,
            expected: Some(expected),
        });
        self
    }

    pub fn insert_withdrawal(mut self, request: WithdrawalRequest) -> Self {
        self.withdrawals.push(Guarded {
            record: request,
            expected: None,
        });
        self
    }

    pub fn update_withdrawal(mut self, request: WithdrawalRequest, expected: WithdrawalState) -> Self {
        self.withdrawals.push(Guarded {
            record: request,
            expected: Some(expected),
        });
        self
    }

    pub fn post(mut self, entry: PendingEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Every account the changeset touches, new or existing.
    pub fn touched_accounts(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self
            .accounts
            .iter()
            .map(|a| a.id.clone())
            .chain(self.entries.iter().map(|e| e.account_id.clone()))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Posts the staged entries against working copies of the touched accounts.
    ///
    /// `accounts` holds the currently stored accounts; the changeset's new
    /// accounts are added when absent. On error the caller must discard the
    /// working copies.
    pub fn post_entries(
        &self,
        accounts: &mut HashMap<AccountId, Account>,
    ) -> Result<Vec<LedgerEntry>> {
        for account in &self.accounts {
            accounts
                .entry(account.id.clone())
                .or_insert_with(|| account.clone());
        }

        self.entries
            .iter()
            .map(|pending| {
                accounts
                    .get_mut(&pending.account_id)
                    .ok_or_else(|| LedgerError::AccountNotFound(pending.account_id.to_string()))?
                    .post(pending.clone())
            })
            .collect()
    }
}
