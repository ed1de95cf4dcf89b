use crate::domain::account::Account;
use crate::domain::changeset::Changeset;
use crate::domain::earning::Earning;
use crate::domain::ids::{AccountId, OrderId, PayoutId, WithdrawalId};
use crate::domain::ledger::{LedgerEntry, Page};
use crate::domain::payout::Payout;
use crate::domain::ports::LedgerStore;
use crate::domain::withdrawal::WithdrawalRequest;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for account state (materialised balance and sequence).
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for the append-only entry log, keyed by account and sequence.
pub const CF_ENTRIES: &str = "ledger_entries";
/// Column Family marking orders whose earnings were recorded.
pub const CF_ORDERS: &str = "orders";
/// Column Family for earnings, keyed by account and earning id.
pub const CF_EARNINGS: &str = "earnings";
/// Column Family for payouts, keyed by account and payout id.
pub const CF_PAYOUTS: &str = "payouts";
/// Column Family for withdrawal requests, keyed by account and request id.
pub const CF_WITHDRAWALS: &str = "withdrawal_requests";
/// Payout id to owning account id.
pub const CF_PAYOUT_ACCOUNTS: &str = "payout_accounts";
/// Withdrawal request id to owning account id.
pub const CF_WITHDRAWAL_ACCOUNTS: &str = "withdrawal_accounts";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_ACCOUNTS,
    CF_ENTRIES,
    CF_ORDERS,
    CF_EARNINGS,
    CF_PAYOUTS,
    CF_WITHDRAWALS,
    CF_PAYOUT_ACCOUNTS,
    CF_WITHDRAWAL_ACCOUNTS,
];

/// A persistent store implementation using RocksDB.
///
/// Each table lives in its own Column Family. A commit is validated while
/// holding `commit_lock` and written as a single `WriteBatch`, so a changeset
/// is either fully persisted or not at all.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

/// Length-prefixed account id, so no id is a key prefix of another.
fn account_prefix(account: &AccountId) -> Vec<u8> {
    let id = account.as_str().as_bytes();
    let mut key = Vec::with_capacity(4 + id.len() + 16);
    key.extend_from_slice(&(id.len() as u32).to_be_bytes());
    key.extend_from_slice(id);
    key
}

fn entry_key(account: &AccountId, sequence: u64) -> Vec<u8> {
    let mut key = account_prefix(account);
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

fn record_key(account: &AccountId, id: &uuid::Uuid) -> Vec<u8> {
    let mut key = account_prefix(account);
    key.extend_from_slice(id.as_bytes());
    key
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that every column family the ledger needs exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: impl AsRef<[u8]>) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    /// Values of every key starting with `prefix`, in key order.
    fn scan_prefix<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let iter = self.db.iterator_cf(
            self.cf(cf)?,
            IteratorMode::From(prefix, rocksdb::Direction::Forward),
        );

        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    /// Looks up a record through its id-to-account index.
    fn get_indexed<T: DeserializeOwned>(
        &self,
        index_cf: &str,
        cf: &str,
        id: &uuid::Uuid,
    ) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(index_cf)?, id.as_bytes())? {
            Some(account) => {
                let account = String::from_utf8(account)
                    .map_err(|e| LedgerError::Storage(format!("corrupt account index: {e}")))?;
                self.get_json(cf, record_key(&AccountId::new(account), id))
            }
            None => Ok(None),
        }
    }

    fn scan_all<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        self.db
            .iterator_cf(self.cf(cf)?, IteratorMode::Start)
            .map(|item| -> Result<T> {
                let (_key, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn account(&self, id: &AccountId) -> Result<Option<Account>> {
        self.get_json(CF_ACCOUNTS, id.as_str())
    }

    async fn accounts(&self) -> Result<Vec<Account>> {
        self.scan_all(CF_ACCOUNTS)
    }

    async fn entries(&self, id: &AccountId, page: Page) -> Result<Vec<LedgerEntry>> {
        let entries: Vec<LedgerEntry> = self.scan_prefix(CF_ENTRIES, &account_prefix(id))?;
        Ok(page.apply(entries))
    }

    async fn order_recorded(&self, order: &OrderId) -> Result<bool> {
        let result = self.db.get_pinned_cf(self.cf(CF_ORDERS)?, order.as_str())?;
        Ok(result.is_some())
    }

    async fn earnings(&self, id: &AccountId) -> Result<Vec<Earning>> {
        let mut earnings: Vec<Earning> = self.scan_prefix(CF_EARNINGS, &account_prefix(id))?;
        earnings.sort_by_key(|e| e.created_at);
        Ok(earnings)
    }

    async fn payout(&self, id: PayoutId) -> Result<Option<Payout>> {
        self.get_indexed(CF_PAYOUT_ACCOUNTS, CF_PAYOUTS, &id.0)
    }

    async fn payouts(&self, id: &AccountId) -> Result<Vec<Payout>> {
        let mut payouts: Vec<Payout> = self.scan_prefix(CF_PAYOUTS, &account_prefix(id))?;
        payouts.sort_by_key(|p| p.created_at);
        Ok(payouts)
    }

    async fn withdrawal(&self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        self.get_indexed(CF_WITHDRAWAL_ACCOUNTS, CF_WITHDRAWALS, &id.0)
    }

    async fn withdrawals(&self, id: &AccountId) -> Result<Vec<WithdrawalRequest>> {
        let mut requests: Vec<WithdrawalRequest> =
            self.scan_prefix(CF_WITHDRAWALS, &account_prefix(id))?;
        requests.sort_by_key(|w| w.created_at);
        Ok(requests)
    }

    async fn commit(&self, changes: Changeset) -> Result<Vec<LedgerEntry>> {
        let _guard = self.commit_lock.lock().await;

        if let Some(order) = &changes.order
            && self.order_recorded(order).await?
        {
            return Err(LedgerError::DuplicateOrderEarnings(order.to_string()));
        }
        for write in &changes.earnings {
            let current: Option<Earning> = self.get_json(CF_EARNINGS, record_key(&write.record.account_id, &write.record.id.0))?;
            write.check("earning", write.record.id, current.map(|e| e.state))?;
        }
        for write in &changes.payouts {
            let current: Option<Payout> = self.get_json(CF_PAYOUTS, record_key(&write.record.account_id, &write.record.id.0))?;
            write.check("payout", write.record.id, current.map(|p| p.state))?;
        }
        for write in &changes.withdrawals {
            let current: Option<WithdrawalRequest> =
                self.get_json(
                    CF_WITHDRAWALS,
                    record_key(&write.record.account_id, &write.record.id.0),
                )?;
            write.check("withdrawal", write.record.id, current.map(|w| w.state))?;
        }

        let mut working = HashMap::new();
        for id in changes.touched_accounts() {
            if let Some(account) = self.get_json::<Account>(CF_ACCOUNTS, id.as_str())? {
                working.insert(id, account);
            }
        }
        let entries = changes.post_entries(&mut working)?;

        for id in changes
            .earnings
            .iter()
            .map(|w| &w.record.account_id)
            .chain(changes.payouts.iter().map(|w| &w.record.account_id))
            .chain(changes.withdrawals.iter().map(|w| &w.record.account_id))
        {
            if !working.contains_key(id) && self.account(id).await?.is_none() {
                return Err(LedgerError::AccountNotFound(id.to_string()));
            }
        }

        let mut batch = WriteBatch::default();
        for account in working.values() {
            self.put_json(&mut batch, CF_ACCOUNTS, account.id.as_str(), account)?;
        }
        for entry in &entries {
            self.put_json(
                &mut batch,
                CF_ENTRIES,
                entry_key(&entry.account_id, entry.sequence),
                entry,
            )?;
        }
        if let Some(order) = &changes.order {
            batch.put_cf(self.cf(CF_ORDERS)?, order.as_str(), b"");
        }
        for write in &changes.earnings {
            self.put_json(
                &mut batch,
                CF_EARNINGS,
                record_key(&write.record.account_id, &write.record.id.0),
                &write.record,
            )?;
        }
        for write in &changes.payouts {
            self.put_json(
                &mut batch,
                CF_PAYOUTS,
                record_key(&write.record.account_id, &write.record.id.0),
                &write.record,
            )?;
            batch.put_cf(
                self.cf(CF_PAYOUT_ACCOUNTS)?,
                write.record.id.0.as_bytes(),
                write.record.account_id.as_str(),
            );
        }
        for write in &changes.withdrawals {
            self.put_json(
                &mut batch,
                CF_WITHDRAWALS,
                record_key(&write.record.account_id, &write.record.id.0),
                &write.record,
            )?;
            batch.put_cf(
                self.cf(CF_WITHDRAWAL_ACCOUNTS)?,
                write.record.id.0.as_bytes(),
                write.record.account_id.as_str(),
            );
        }

        self.db.write(batch)?;
        Ok(entries)
    }
}
