use super::events::{EventPublisher, LedgerEvent};
use super::retry_on_conflict;
use crate::domain::changeset::Changeset;
use crate::domain::earning::{Earning, EarningState};
use crate::domain::ids::{AccountId, PayoutId};
use crate::domain::ledger::{LedgerEntry, PendingEntry, ReasonCode};
use crate::domain::payout::{Payout, PayoutState};
use crate::domain::ports::LedgerStoreRef;
use crate::error::{LedgerError, Result};

/// Bundles unsettled earnings into payouts and settles them.
#[derive(Clone)]
pub struct PayoutAggregator {
    store: LedgerStoreRef,
    events: EventPublisher,
    max_retries: u32,
}

impl PayoutAggregator {
    pub fn new(store: LedgerStoreRef, events: EventPublisher, max_retries: u32) -> Self {
        Self {
            store,
            events,
            max_retries,
        }
    }

    /// Reserves every unsettled earning of the account into a new pending payout.
    ///
    /// A payout total never exceeds `MAX_AMOUNT`; earnings beyond it stay
    /// unsettled for the next payout.
    ///
    /// Concurrent callers race on the earnings' state: only one can move a
    /// given earning out of `unsettled`. The loser re-reads and, if nothing is
    /// left, fails with `NothingToPayout`.
    pub async fn create_payout(&self, account_id: &AccountId) -> Result<Payout> {
        let payout = retry_on_conflict(self.max_retries, "create_payout", || {
            self.try_create_payout(account_id)
        })
        .await?;

        tracing::info!(
            account = %payout.account_id,
            payout = %payout.id,
            total = %payout.total_amount,
            earnings = payout.earning_ids.len(),
            "payout created"
        );
        self.events.publish(LedgerEvent::PayoutCreated(payout.clone()));
        Ok(payout)
    }

    async fn try_create_payout(&self, account_id: &AccountId) -> Result<Payout> {
        let unsettled: Vec<Earning> = self
            .store
            .earnings(account_id)
            .await?
            .into_iter()
            .filter(|e| e.state == EarningState::Unsettled)
            .collect();
        if unsettled.is_empty() {
            return Err(LedgerError::NothingToPayout(account_id.to_string()));
        }

        let payout = Payout::aggregate(PayoutId::new(), account_id.clone(), &unsettled)?;
        let mut changes = Changeset::new().insert_payout(payout.clone());
        for mut earning in unsettled
            .into_iter()
            .filter(|e| payout.earning_ids.contains(&e.id))
        {
            earning.reserve(payout.id)?;
            changes = changes.update_earning(earning, EarningState::Unsettled);
        }

        self.store.commit(changes).await?;
        Ok(payout)
    }

    /// Settles a pending payout and credits its total to the account.
    ///
    /// Settling twice fails with `AlreadySettled` and credits nothing.
    pub async fn mark_payout_paid(&self, payout_id: PayoutId) -> Result<Payout> {
        let (payout, entry) = retry_on_conflict(self.max_retries, "mark_payout_paid", || {
            self.try_mark_paid(payout_id)
        })
        .await?;

        tracing::info!(
            account = %payout.account_id,
            payout = %payout.id,
            total = %payout.total_amount,
            balance = %entry.balance_after,
            "payout settled"
        );
        self.events.publish(LedgerEvent::PayoutPaid {
            payout: payout.clone(),
            entry,
        });
        Ok(payout)
    }

    async fn try_mark_paid(&self, payout_id: PayoutId) -> Result<(Payout, LedgerEntry)> {
        let mut payout = self
            .store
            .payout(payout_id)
            .await?
            .ok_or_else(|| LedgerError::PayoutNotFound(payout_id.to_string()))?;
        payout.mark_paid()?;

        let reserved = self.reserved_earnings(&payout).await?;
        let mut changes = Changeset::new().update_payout(payout.clone(), PayoutState::Pending);
        for mut earning in reserved {
            earning.mark_paid()?;
            changes = changes.update_earning(earning, EarningState::Reserved);
        }
        changes = changes.post(PendingEntry::credit(
            payout.account_id.clone(),
            payout.total_amount,
            ReasonCode::PayoutSettlement,
            payout.id.to_string(),
        ));

        let entry = self
            .store
            .commit(changes)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Storage("commit returned no entry".to_string()))?;
        Ok((payout, entry))
    }

    /// The earnings a payout bundles; all of the ids recorded on it must be found.
    async fn reserved_earnings(&self, payout: &Payout) -> Result<Vec<Earning>> {
        let earnings = self.payout_earnings(payout.id).await?;
        if earnings.len() != payout.earning_ids.len() {
            return Err(LedgerError::Storage(format!(
                "payout {} references {} earnings but {} were found",
                payout.id,
                payout.earning_ids.len(),
                earnings.len()
            )));
        }
        Ok(earnings)
    }

    pub async fn get_payout(&self, payout_id: PayoutId) -> Result<Payout> {
        self.store
            .payout(payout_id)
            .await?
            .ok_or_else(|| LedgerError::PayoutNotFound(payout_id.to_string()))
    }

    /// Earnings included in a payout.
    pub async fn payout_earnings(&self, payout_id: PayoutId) -> Result<Vec<Earning>> {
        let payout = self.get_payout(payout_id).await?;
        Ok(self
            .store
            .earnings(&payout.account_id)
            .await?
            .into_iter()
            .filter(|e| e.payout_id == Some(payout_id))
            .collect())
    }

    pub async fn payouts(&self, account_id: &AccountId) -> Result<Vec<Payout>> {
        self.store.payouts(account_id).await
    }

    pub async fn pending_payouts(&self, account_id: &AccountId) -> Result<Vec<Payout>> {
        Ok(self
            .payouts(account_id)
            .await?
            .into_iter()
            .filter(|p| p.state == PayoutState::Pending)
            .collect())
    }
}
