//! Application layer: the ledger's four services and the engine facade.
//!
//! Every mutating operation reads current state, builds one
//! [`Changeset`](crate::domain::changeset::Changeset) and hands it to the store.
//! When a concurrent caller claims the same record first the commit fails with
//! `Conflict`; the operation then re-reads state and tries again, which turns a
//! lost race into the business error the new state implies.

pub mod earnings;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod payouts;
pub mod withdrawals;

use crate::error::{LedgerError, Result};
use std::future::Future;

pub(crate) async fn retry_on_conflict<T, F, Fut>(
    max_retries: u32,
    operation: &'static str,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(LedgerError::Conflict(reason)) if retries < max_retries => {
                retries += 1;
                tracing::debug!(operation, retries, %reason, "lost optimistic claim, re-reading state");
            }
            other => return other,
        }
    }
}
