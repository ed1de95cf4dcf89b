use super::ids::{AccountId, WithdrawalId};
use super::money::Amount;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalState {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, WithdrawalState::Pending)
    }
}

impl fmt::Display for WithdrawalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WithdrawalState::Pending => f.write_str("pending"),
            WithdrawalState::Approved => f.write_str("approved"),
            WithdrawalState::Rejected => f.write_str("rejected"),
        }
    }
}

/// A seller's request to cash out part of their balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: WithdrawalId,
    pub account_id: AccountId,
    pub amount: Amount,
    /// Where the money goes, e.g. a mobile-money number.
    pub destination_ref: String,
    pub state: WithdrawalState,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    pub fn new(
        account_id: AccountId,
        amount: Amount,
        destination_ref: &str,
    ) -> Result<Self, LedgerError> {
        let destination_ref = destination_ref.trim();
        if destination_ref.is_empty() {
            return Err(LedgerError::InvalidDestination);
        }

        Ok(Self {
            id: WithdrawalId::new(),
            account_id,
            amount,
            destination_ref: destination_ref.to_string(),
            state: WithdrawalState::Pending,
            remarks: None,
            created_at: Utc::now(),
            processed_at: None,
        })
    }

    fn ensure_pending(&self) -> Result<(), LedgerError> {
        if self.state.is_terminal() {
            return Err(LedgerError::AlreadyProcessed(self.id.to_string()));
        }
        Ok(())
    }

    pub fn approve(&mut self, remarks: Option<&str>) -> Result<(), LedgerError> {
        self.ensure_pending()?;
        self.state = WithdrawalState::Approved;
        self.remarks = remarks
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        self.processed_at = Some(Utc::now());
        Ok(())
    }

    pub fn reject(&mut self, remarks: Option<&str>) -> Result<(), LedgerError> {
        self.ensure_pending()?;
        let remarks = remarks
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(LedgerError::RemarksRequired)?;
        self.state = WithdrawalState::Rejected;
        self.remarks = Some(remarks.to_string());
        self.processed_at = Some(Utc::now());
        Ok(())
    }
}
