use super::ids::{AccountId, EarningId, OrderId, PayoutId};
use super::money::{Amount, CommissionRate};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EarningState {
    Unsettled,
    Reserved,
    Paid,
}

impl fmt::Display for EarningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EarningState::Unsettled => f.write_str("unsettled"),
            EarningState::Reserved => f.write_str("reserved"),
            EarningState::Paid => f.write_str("paid"),
        }
    }
}

/// One seller's cut of a paid order line item, as handed over by the order subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerShare {
    pub account_id: AccountId,
    /// Owner of the account when it has to be created; defaults to the account id.
    #[serde(default)]
    pub owner_id: Option<String>,
    pub order_item_ref: String,
    pub gross_amount: Decimal,
    pub commission_rate: Decimal,
}

impl SellerShare {
    pub fn new(
        account_id: impl Into<AccountId>,
        order_item_ref: impl Into<String>,
        gross_amount: Decimal,
        commission_rate: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            owner_id: None,
            order_item_ref: order_item_ref.into(),
            gross_amount,
            commission_rate,
        }
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }
}

/// A seller's earning from one order line item.
///
/// Moves `unsettled -> reserved -> paid`. `payout_id` is set on reservation
/// and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Earning {
    pub id: EarningId,
    pub account_id: AccountId,
    pub order_id: OrderId,
    pub order_item_ref: String,
    pub gross_amount: Amount,
    pub commission_amount: Decimal,
    pub net_amount: Amount,
    pub state: EarningState,
    pub payout_id: Option<PayoutId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Earning {
    /// Validates a share and computes its net amount.
    pub fn from_share(order_id: &OrderId, share: &SellerShare) -> Result<Self, LedgerError> {
        let gross = Amount::new(share.gross_amount)?;
        let rate = CommissionRate::new(share.commission_rate)?;
        let (net, commission) = rate.split(gross)?;
        let now = Utc::now();

        Ok(Self {
            id: EarningId::new(),
            account_id: share.account_id.clone(),
            order_id: order_id.clone(),
            order_item_ref: share.order_item_ref.clone(),
            gross_amount: gross,
            commission_amount: commission,
            net_amount: net,
            state: EarningState::Unsettled,
            payout_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn reserve(&mut self, payout_id: PayoutId) -> Result<(), LedgerError> {
        if self.state != EarningState::Unsettled {
            return Err(LedgerError::Conflict(format!(
                "earning {} is {}, expected unsettled",
                self.id, self.state
            )));
        }
        self.state = EarningState::Reserved;
        self.payout_id = Some(payout_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_paid(&mut self) -> Result<(), LedgerError> {
        if self.state != EarningState::Reserved {
            return Err(LedgerError::Conflict(format!(
                "earning {} is {}, expected reserved",
                self.id, self.state
            )));
        }
        self.state = EarningState::Paid;
        self.updated_at = Utc::now();
        Ok(())
    }
}
