use super::events::{EventPublisher, LedgerEvent};
use super::retry_on_conflict;
use crate::domain::changeset::Changeset;
use crate::domain::ids::{AccountId, WithdrawalId};
use crate::domain::ledger::{LedgerEntry, PendingEntry, ReasonCode};
use crate::domain::money::Amount;
use crate::domain::ports::LedgerStoreRef;
use crate::domain::withdrawal::{WithdrawalRequest, WithdrawalState};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;

/// Seller cash-out requests and the admin decision on them.
#[derive(Clone)]
pub struct WithdrawalProcessor {
    store: LedgerStoreRef,
    events: EventPublisher,
    max_retries: u32,
}

impl WithdrawalProcessor {
    pub fn new(store: LedgerStoreRef, events: EventPublisher, max_retries: u32) -> Self {
        Self {
            store,
            events,
            max_retries,
        }
    }

    /// Files a pending request. No money moves until it is approved.
    pub async fn request_withdrawal(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        destination_ref: &str,
    ) -> Result<WithdrawalRequest> {
        let amount = Amount::new(amount)?;
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        if !account.balance.covers(amount) {
            return Err(LedgerError::InsufficientBalance {
                account: account_id.to_string(),
                requested: amount.value(),
                available: account.balance.value(),
            });
        }

        let request = WithdrawalRequest::new(account_id.clone(), amount, destination_ref)?;
        self.store
            .commit(Changeset::new().insert_withdrawal(request.clone()))
            .await?;

        tracing::info!(
            account = %account_id,
            request = %request.id,
            amount = %request.amount,
            "withdrawal requested"
        );
        self.events
            .publish(LedgerEvent::WithdrawalRequested(request.clone()));
        Ok(request)
    }

    /// Approves or rejects a pending request.
    ///
    /// Approval re-checks the balance and writes the debit in the same commit
    /// that marks the request approved. If the balance no longer covers the
    /// amount the request stays pending. Rejection needs non-empty remarks and
    /// leaves the balance alone.
    pub async fn decide(
        &self,
        request_id: WithdrawalId,
        approve: bool,
        remarks: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        if approve {
            let (request, entry) = retry_on_conflict(self.max_retries, "approve_withdrawal", || {
                self.try_approve(request_id, remarks)
            })
            .await?;

            tracing::info!(
                account = %request.account_id,
                request = %request.id,
                amount = %request.amount,
                balance = %entry.balance_after,
                "withdrawal approved"
            );
            self.events.publish(LedgerEvent::WithdrawalApproved {
                request: request.clone(),
                entry,
            });
            Ok(request)
        } else {
            let request = retry_on_conflict(self.max_retries, "reject_withdrawal", || {
                self.try_reject(request_id, remarks)
            })
            .await?;

            tracing::info!(
                account = %request.account_id,
                request = %request.id,
                remarks = request.remarks.as_deref().unwrap_or_default(),
                "withdrawal rejected"
            );
            self.events
                .publish(LedgerEvent::WithdrawalRejected(request.clone()));
            Ok(request)
        }
    }

    async fn try_approve(
        &self,
        request_id: WithdrawalId,
        remarks: Option<&str>,
    ) -> Result<(WithdrawalRequest, LedgerEntry)> {
        let mut request = self.get_withdrawal(request_id).await?;
        request.approve(remarks)?;

        let balance = self
            .store
            .account(&request.account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(request.account_id.to_string()))?
            .balance;
        if !balance.covers(request.amount) {
            return Err(LedgerError::InsufficientBalance {
                account: request.account_id.to_string(),
                requested: request.amount.value(),
                available: balance.value(),
            });
        }

        let changes = Changeset::new()
            .update_withdrawal(request.clone(), WithdrawalState::Pending)
            .post(PendingEntry::debit(
                request.account_id.clone(),
                request.amount,
                ReasonCode::WithdrawalDebit,
                request.id.to_string(),
            ));
        let entry = self
            .store
            .commit(changes)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::Storage("commit returned no entry".to_string()))?;
        Ok((request, entry))
    }

    async fn try_reject(
        &self,
        request_id: WithdrawalId,
        remarks: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        let mut request = self.get_withdrawal(request_id).await?;
        request.reject(remarks)?;
        self.store
            .commit(Changeset::new().update_withdrawal(request.clone(), WithdrawalState::Pending))
            .await?;
        Ok(request)
    }

    pub async fn get_withdrawal(&self, request_id: WithdrawalId) -> Result<WithdrawalRequest> {
        self.store
            .withdrawal(request_id)
            .await?
            .ok_or_else(|| LedgerError::WithdrawalNotFound(request_id.to_string()))
    }

    pub async fn withdrawals(&self, account_id: &AccountId) -> Result<Vec<WithdrawalRequest>> {
        self.store.withdrawals(account_id).await
    }

    pub async fn pending_withdrawals(&self, account_id: &AccountId) -> Result<Vec<WithdrawalRequest>> {
        Ok(self
            .withdrawals(account_id)
            .await?
            .into_iter()
            .filter(|w| w.state == WithdrawalState::Pending)
            .collect())
    }
}
