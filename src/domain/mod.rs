//! Entities, value objects and the storage port of the ledger.

pub mod account;
pub mod changeset;
pub mod earning;
pub mod ids;
pub mod ledger;
pub mod money;
pub mod payout;
pub mod ports;
pub mod withdrawal;
