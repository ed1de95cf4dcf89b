use super::earnings::EarningsRecorder;
use super::events::{EventPublisher, LedgerEvent};
use super::ledger::{LedgerService, ReconciliationReport};
use super::payouts::PayoutAggregator;
use super::withdrawals::WithdrawalProcessor;
use crate::config::EngineConfig;
use crate::domain::account::Account;
use crate::domain::earning::{Earning, EarningState, SellerShare};
use crate::domain::ids::{AccountId, OrderId, PayoutId, WithdrawalId};
use crate::domain::ledger::{Direction, LedgerEntry, Page, ReasonCode};
use crate::domain::money::Balance;
use crate::domain::payout::Payout;
use crate::domain::ports::LedgerStoreRef;
use crate::domain::withdrawal::{WithdrawalRequest, WithdrawalState};
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

/// Financial overview of one account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSummary {
    pub account: AccountId,
    pub owner: String,
    pub currency: String,
    /// Spendable balance from the ledger.
    pub balance: Balance,
    /// Earnings not yet bundled into a payout.
    pub unsettled: Balance,
    /// Earnings inside pending payouts.
    pub reserved: Balance,
    /// Earnings whose payout has been settled.
    pub paid_out: Balance,
    pub pending_withdrawals: Balance,
    pub withdrawn: Balance,
}

/// The marketplace ledger and payout engine.
///
/// `MarketplaceEngine` wires the four services to one store and one event
/// channel. It is cheap to clone and safe to share between request handlers;
/// all coordination happens in the store's atomic commit.
#[derive(Clone)]
pub struct MarketplaceEngine {
    store: LedgerStoreRef,
    events: EventPublisher,
    ledger: LedgerService,
    earnings: EarningsRecorder,
    payouts: PayoutAggregator,
    withdrawals: WithdrawalProcessor,
}

impl MarketplaceEngine {
    /// Creates a new `MarketplaceEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - The backend holding accounts, entries, earnings, payouts and requests.
    /// * `config` - Currency for new accounts, retry budget and event buffer size.
    pub fn new(store: LedgerStoreRef, config: EngineConfig) -> Self {
        let events = EventPublisher::new(config.event_capacity);
        Self {
            ledger: LedgerService::new(store.clone(), events.clone()),
            earnings: EarningsRecorder::new(store.clone(), events.clone(), config.currency),
            payouts: PayoutAggregator::new(
                store.clone(),
                events.clone(),
                config.max_conflict_retries,
            ),
            withdrawals: WithdrawalProcessor::new(
                store.clone(),
                events.clone(),
                config.max_conflict_retries,
            ),
            store,
            events,
        }
    }

    pub fn ledger(&self) -> &LedgerService {
        &self.ledger
    }

    pub fn earnings(&self) -> &EarningsRecorder {
        &self.earnings
    }

    pub fn payouts(&self) -> &PayoutAggregator {
        &self.payouts
    }

    pub fn withdrawals(&self) -> &WithdrawalProcessor {
        &self.withdrawals
    }

    /// Receives every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub async fn record_order_earnings(
        &self,
        order_id: &OrderId,
        shares: &[SellerShare],
    ) -> Result<Vec<Earning>> {
        self.earnings.record_order_earnings(order_id, shares).await
    }

    pub async fn create_payout(&self, account_id: &AccountId) -> Result<Payout> {
        self.payouts.create_payout(account_id).await
    }

    pub async fn mark_payout_paid(&self, payout_id: PayoutId) -> Result<Payout> {
        self.payouts.mark_payout_paid(payout_id).await
    }

    pub async fn request_withdrawal(
        &self,
        account_id: &AccountId,
        amount: Decimal,
        destination_ref: &str,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals
            .request_withdrawal(account_id, amount, destination_ref)
            .await
    }

    pub async fn decide(
        &self,
        request_id: WithdrawalId,
        approve: bool,
        remarks: Option<&str>,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.decide(request_id, approve, remarks).await
    }

    /// Admin credit or debit outside the earning and withdrawal flows.
    pub async fn adjust_balance(
        &self,
        account_id: &AccountId,
        direction: Direction,
        amount: Decimal,
        reference_id: &str,
    ) -> Result<LedgerEntry> {
        self.ledger
            .record_entry(
                account_id,
                direction,
                amount,
                ReasonCode::AdminAdjustment,
                reference_id,
            )
            .await
    }

    pub async fn get_balance(&self, account_id: &AccountId) -> Result<Balance> {
        self.ledger.balance(account_id).await
    }

    pub async fn list_entries(&self, account_id: &AccountId, page: Page) -> Result<Vec<LedgerEntry>> {
        self.ledger.list_entries(account_id, page).await
    }

    pub async fn reconcile(&self, account_id: &AccountId) -> Result<ReconciliationReport> {
        self.ledger.reconcile(account_id).await
    }

    pub async fn reconcile_all(&self) -> Result<Vec<ReconciliationReport>> {
        self.ledger.reconcile_all().await
    }

    pub async fn accounts(&self) -> Result<Vec<Account>> {
        self.store.accounts().await
    }

    /// Builds the financial overview of one account from committed state.
    pub async fn summary(&self, account_id: &AccountId) -> Result<AccountSummary> {
        let account = self
            .store
            .account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;
        self.summarize(account).await
    }

    /// Summaries of every account, ordered by account id.
    pub async fn summaries(&self) -> Result<Vec<AccountSummary>> {
        let mut summaries = Vec::new();
        for account in self.store.accounts().await? {
            summaries.push(self.summarize(account).await?);
        }
        Ok(summaries)
    }

    async fn summarize(&self, account: Account) -> Result<AccountSummary> {
        let earnings = self.store.earnings(&account.id).await?;
        let earned = |state: EarningState| -> Result<Balance> {
            Balance::try_sum(
                earnings
                    .iter()
                    .filter(|e| e.state == state)
                    .map(|e| Balance::from(e.net_amount)),
            )
        };

        let requests = self.store.withdrawals(&account.id).await?;
        let requested = |state: WithdrawalState| -> Result<Balance> {
            Balance::try_sum(
                requests
                    .iter()
                    .filter(|w| w.state == state)
                    .map(|w| Balance::from(w.amount)),
            )
        };

        Ok(AccountSummary {
            unsettled: earned(EarningState::Unsettled)?,
            reserved: earned(EarningState::Reserved)?,
            paid_out: earned(EarningState::Paid)?,
            pending_withdrawals: requested(WithdrawalState::Pending)?,
            withdrawn: requested(WithdrawalState::Approved)?,
            balance: account.balance,
            account: account.id,
            owner: account.owner_id,
            currency: account.currency,
        })
    }
}
