use super::events::{EventPublisher, LedgerEvent};
use crate::domain::account::Account;
use crate::domain::changeset::Changeset;
use crate::domain::earning::{Earning, SellerShare};
use crate::domain::ids::{AccountId, OrderId};
use crate::domain::ports::LedgerStoreRef;
use crate::error::{LedgerError, Result};
use std::collections::HashSet;

/// Turns a paid order's seller shares into unsettled earnings.
///
/// Recording does not touch balances. Money becomes spendable only when the
/// payout that bundles the earnings is settled.
#[derive(Clone)]
pub struct EarningsRecorder {
    store: LedgerStoreRef,
    events: EventPublisher,
    currency: String,
}

impl EarningsRecorder {
    pub fn new(store: LedgerStoreRef, events: EventPublisher, currency: impl Into<String>) -> Self {
        Self {
            store,
            events,
            currency: currency.into(),
        }
    }

    /// Records one earning per share, once per order.
    ///
    /// A replay of the same `order_id` fails with `DuplicateOrderEarnings`,
    /// also when two replays race each other.
    pub async fn record_order_earnings(
        &self,
        order_id: &OrderId,
        shares: &[SellerShare],
    ) -> Result<Vec<Earning>> {
        if shares.is_empty() {
            return Err(LedgerError::NoSellerShares(order_id.to_string()));
        }
        if self.store.order_recorded(order_id).await? {
            return Err(LedgerError::DuplicateOrderEarnings(order_id.to_string()));
        }

        let earnings = shares
            .iter()
            .map(|share| Earning::from_share(order_id, share))
            .collect::<Result<Vec<_>>>()?;

        let mut changes = Changeset::new().record_order(order_id.clone());
        let mut seen: HashSet<&AccountId> = HashSet::new();
        for share in shares {
            if !seen.insert(&share.account_id) {
                continue;
            }
            if self.store.account(&share.account_id).await?.is_none() {
                let owner = share
                    .owner_id
                    .clone()
                    .unwrap_or_else(|| share.account_id.to_string());
                changes = changes.open_account(Account::new(
                    share.account_id.clone(),
                    owner,
                    self.currency.clone(),
                ));
            }
        }
        for earning in &earnings {
            changes = changes.insert_earning(earning.clone());
        }

        self.store.commit(changes).await?;

        tracing::info!(
            order = %order_id,
            earnings = earnings.len(),
            sellers = seen.len(),
            "order earnings recorded"
        );
        self.events.publish(LedgerEvent::EarningsRecorded {
            order_id: order_id.clone(),
            earnings: earnings.clone(),
        });
        Ok(earnings)
    }

    /// All earnings of an account, oldest first.
    pub async fn earnings(&self, account_id: &AccountId) -> Result<Vec<Earning>> {
        self.store.earnings(account_id).await
    }
}
