use crate::domain::UserId;
use crate::domain::ledger::LedgerEntry;
use crate::domain::order::Order;
use crate::domain::ports::{LedgerStore, Sequence, Settlement};
use crate::domain::wallet::Wallet;
use crate::domain::withdrawal::Withdrawal;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for wallet rows, keyed by user id.
pub const CF_WALLETS: &str = "wallets";
/// Column Family for ledger entries, keyed by user id then entry id.
pub const CF_ENTRIES: &str = "entries";
/// Column Family mapping (user id, external reference) to an entry id.
pub const CF_REFERENCES: &str = "references";
/// Column Family for orders, keyed by order id.
pub const CF_ORDERS: &str = "orders";
/// Column Family for withdrawals, keyed by withdrawal id.
pub const CF_WITHDRAWALS: &str = "withdrawals";

const COLUMN_FAMILIES: [&str; 5] = [CF_WALLETS, CF_ENTRIES, CF_REFERENCES, CF_ORDERS, CF_WITHDRAWALS];

/// A persistent ledger store backed by RocksDB.
///
/// Every table lives in its own Column Family and values are JSON. A
/// settlement is written through a single `WriteBatch`, so it lands entirely
/// or not at all. Version and reference checks run under `commit_guard`,
/// which serializes writers within this process.
///
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_guard: Arc<Mutex<()>>,
    entry_seq: Arc<AtomicU64>,
    order_seq: Arc<AtomicU64>,
    withdrawal_seq: Arc<AtomicU64>,
}

fn entry_key(user: UserId, id: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&user.to_be_bytes());
    key[8..].copy_from_slice(&id.to_be_bytes());
    key
}

fn reference_key(user: UserId, reference: &str) -> Vec<u8> {
    let mut key = user.to_be_bytes().to_vec();
    key.extend_from_slice(reference.as_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| LedgerError::Storage(format!("malformed id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at `path`, creating missing column
    /// families and resuming id sequences after the highest stored ids.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        let store = Self {
            db: Arc::new(db),
            commit_guard: Arc::new(Mutex::new(())),
            entry_seq: Arc::new(AtomicU64::new(0)),
            order_seq: Arc::new(AtomicU64::new(0)),
            withdrawal_seq: Arc::new(AtomicU64::new(0)),
        };
        store.entry_seq.store(store.max_entry_id()?, Ordering::SeqCst);
        store.order_seq.store(store.last_id(CF_ORDERS)?, Ordering::SeqCst);
        store
            .withdrawal_seq
            .store(store.last_id(CF_WITHDRAWALS)?, Ordering::SeqCst);
        Ok(store)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family {name} not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let mode = IteratorMode::From(prefix, Direction::Forward);
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }

    fn put_json<T: Serialize>(&self, batch: &mut WriteBatch, cf: &str, key: &[u8], value: &T) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key, serde_json::to_vec(value)?);
        Ok(())
    }

    fn last_id(&self, cf: &str) -> Result<u64> {
        match self.db.iterator_cf(self.cf(cf)?, IteratorMode::End).next() {
            Some(item) => decode_id(&item?.0),
            None => Ok(0),
        }
    }

    fn max_entry_id(&self) -> Result<u64> {
        let mut max = 0;
        for item in self.db.iterator_cf(self.cf(CF_ENTRIES)?, IteratorMode::Start) {
            let (key, _) = item?;
            max = max.max(decode_id(&key[8..])?);
        }
        Ok(max)
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let counter = match sequence {
            Sequence::Entry => &self.entry_seq,
            Sequence::Order => &self.order_seq,
            Sequence::Withdrawal => &self.withdrawal_seq,
        };
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn create_wallet(&self, user: UserId) -> Result<Wallet> {
        let _guard = self.commit_guard.lock().await;
        if let Some(wallet) = self.get_json(CF_WALLETS, &user.to_be_bytes())? {
            return Ok(wallet);
        }
        let wallet = Wallet::new(user);
        let mut batch = WriteBatch::default();
        self.put_json(&mut batch, CF_WALLETS, &user.to_be_bytes(), &wallet)?;
        self.db.write(batch)?;
        Ok(wallet)
    }

    async fn wallet(&self, user: UserId) -> Result<Option<Wallet>> {
        self.get_json(CF_WALLETS, &user.to_be_bytes())
    }

    async fn wallets(&self) -> Result<Vec<Wallet>> {
        self.scan_json(CF_WALLETS, &[])
    }

    async fn entries(&self, user: UserId) -> Result<Vec<LedgerEntry>> {
        self.scan_json(CF_ENTRIES, &user.to_be_bytes())
    }

    async fn entry_by_reference(
        &self,
        user: UserId,
        reference: &str,
    ) -> Result<Option<LedgerEntry>> {
        let cf = self.cf(CF_REFERENCES)?;
        match self.db.get_cf(cf, reference_key(user, reference))? {
            Some(id) => self.get_json(CF_ENTRIES, &entry_key(user, decode_id(&id)?)),
            None => Ok(None),
        }
    }

    async fn order(&self, id: u64) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, &id.to_be_bytes())
    }

    async fn orders(&self, user: UserId) -> Result<Vec<Order>> {
        let orders: Vec<Order> = self.scan_json(CF_ORDERS, &[])?;
        Ok(orders.into_iter().filter(|o| o.user == user).collect())
    }

    async fn withdrawal(&self, id: u64) -> Result<Option<Withdrawal>> {
        self.get_json(CF_WITHDRAWALS, &id.to_be_bytes())
    }

    async fn withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>> {
        let withdrawals: Vec<Withdrawal> = self.scan_json(CF_WITHDRAWALS, &[])?;
        Ok(withdrawals.into_iter().filter(|w| w.user == user).collect())
    }

    async fn commit(&self, settlement: Settlement) -> Result<()> {
        let _guard = self.commit_guard.lock().await;
        let mut batch = WriteBatch::default();

        for wallet in settlement.wallets {
            let key = wallet.user.to_be_bytes();
            let stored: Wallet = self
                .get_json(CF_WALLETS, &key)?
                .ok_or_else(|| LedgerError::not_found(format!("wallet {}", wallet.user)))?;
            if stored.version != wallet.version {
                return Err(LedgerError::ConcurrencyConflict(wallet.user));
            }
            let next = Wallet {
                version: wallet.version + 1,
                ..wallet
            };
            self.put_json(&mut batch, CF_WALLETS, &key, &next)?;
        }

        for order in &settlement.orders {
            let stored: Option<Order> = self.get_json(CF_ORDERS, &order.id.to_be_bytes())?;
            if stored.is_some_and(|o| o.status.is_terminal()) {
                return Err(LedgerError::ConcurrencyConflict(order.user));
            }
        }
        for withdrawal in &settlement.withdrawals {
            let stored: Option<Withdrawal> =
                self.get_json(CF_WITHDRAWALS, &withdrawal.id.to_be_bytes())?;
            if stored.is_some_and(|w| w.status.is_terminal()) {
                return Err(LedgerError::ConcurrencyConflict(withdrawal.user));
            }
        }

        let references = self.cf(CF_REFERENCES)?;
        for entry in &settlement.entries {
            if let Some(reference) = &entry.reference {
                let key = reference_key(entry.user, reference);
                if let Some(existing) = self.db.get_cf(references, &key)? {
                    return Err(LedgerError::DuplicateOperation {
                        reference: reference.clone(),
                        entry: decode_id(&existing)?,
                    });
                }
                batch.put_cf(references, key, entry.id.to_be_bytes());
            }
            self.put_json(&mut batch, CF_ENTRIES, &entry_key(entry.user, entry.id), entry)?;
        }

        for order in &settlement.orders {
            self.put_json(&mut batch, CF_ORDERS, &order.id.to_be_bytes(), order)?;
        }
        for withdrawal in &settlement.withdrawals {
            self.put_json(&mut batch, CF_WITHDRAWALS, &withdrawal.id.to_be_bytes(), withdrawal)?;
        }

        self.db.write(batch)?;
        Ok(())
    }
}
