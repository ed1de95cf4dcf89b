use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Every failure the engine can hand back to a caller.
///
/// Business errors are expected outcomes and carry enough context to render a
/// message to an admin or seller. Infrastructure errors (`Storage`,
/// `Serialization`, `Csv`, `Io`) mean the outcome of a mutation is unknown and
/// the caller has to re-query state before retrying.
#[derive(Error, Diagnostic, Debug)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    #[diagnostic(code(ledger::invalid_amount))]
    InvalidAmount(String),

    #[error("insufficient balance on account {account}: requested {requested}, available {available}")]
    #[diagnostic(code(ledger::insufficient_balance))]
    InsufficientBalance {
        account: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("account {0} has no unsettled earnings to pay out")]
    #[diagnostic(code(ledger::nothing_to_payout))]
    NothingToPayout(String),

    #[error("payout {0} is already settled")]
    #[diagnostic(code(ledger::already_settled))]
    AlreadySettled(String),

    #[error("withdrawal request {0} has already been processed")]
    #[diagnostic(code(ledger::already_processed))]
    AlreadyProcessed(String),

    #[error("earnings for order {0} were already recorded")]
    #[diagnostic(code(ledger::duplicate_order_earnings))]
    DuplicateOrderEarnings(String),

    #[error("remarks are required when rejecting a withdrawal")]
    #[diagnostic(code(ledger::remarks_required))]
    RemarksRequired,

    #[error("commission rate {0} is outside [0, 1)")]
    #[diagnostic(code(ledger::invalid_commission_rate))]
    InvalidCommissionRate(Decimal),

    #[error("order {0} has no seller shares")]
    #[diagnostic(code(ledger::no_seller_shares))]
    NoSellerShares(String),

    #[error("withdrawal destination must not be empty")]
    #[diagnostic(code(ledger::invalid_destination))]
    InvalidDestination,

    #[error("invalid command: {0}")]
    #[diagnostic(code(ledger::invalid_command))]
    InvalidCommand(String),

    #[error("account {0} not found")]
    #[diagnostic(code(ledger::account_not_found))]
    AccountNotFound(String),

    #[error("payout {0} not found")]
    #[diagnostic(code(ledger::payout_not_found))]
    PayoutNotFound(String),

    #[error("withdrawal request {0} not found")]
    #[diagnostic(code(ledger::withdrawal_not_found))]
    WithdrawalNotFound(String),

    #[error("concurrent update conflict: {0}")]
    #[diagnostic(
        code(ledger::conflict),
        help("another caller claimed the record first; re-query its state before retrying")
    )]
    Conflict(String),

    #[error("storage error: {0}")]
    #[diagnostic(code(ledger::storage))]
    Storage(String),

    #[error("serialization error: {0}")]
    #[diagnostic(code(ledger::serialization))]
    Serialization(String),

    #[error("CSV error: {0}")]
    #[diagnostic(code(ledger::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(ledger::io))]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// True when the operation may be retried after re-reading current state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::Conflict(_)
                | LedgerError::Storage(_)
                | LedgerError::Serialization(_)
                | LedgerError::Io(_)
        )
    }

    /// True for infrastructure failures, as opposed to business rejections.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            LedgerError::Storage(_)
                | LedgerError::Serialization(_)
                | LedgerError::Csv(_)
                | LedgerError::Io(_)
        )
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(value: rocksdb::Error) -> Self {
        Self::Storage(value.to_string())
    }
}
