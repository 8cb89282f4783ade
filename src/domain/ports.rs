use super::UserId;
use super::ledger::LedgerEntry;
use super::order::Order;
use super::wallet::Wallet;
use super::withdrawal::Withdrawal;
use crate::error::Result;
use async_trait::async_trait;

/// Id sequences handed out by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sequence {
    Entry,
    Order,
    Withdrawal,
}

/// The atomic unit of a settlement operation.
///
/// Each wallet carries the version it was read at; the store applies the
/// whole settlement only if every one of those versions is still current, and
/// bumps them on success. Orders and withdrawals may only overwrite rows that
/// are still PENDING or REQUESTED.
#[derive(Debug, Default, Clone)]
pub struct Settlement {
    pub wallets: Vec<Wallet>,
    pub entries: Vec<LedgerEntry>,
    pub orders: Vec<Order>,
    pub withdrawals: Vec<Withdrawal>,
}

impl Settlement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wallet(mut self, wallet: Wallet) -> Self {
        self.wallets.push(wallet);
        self
    }

    pub fn entry(mut self, entry: LedgerEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn withdrawal(mut self, withdrawal: Withdrawal) -> Self {
        self.withdrawals.push(withdrawal);
        self
    }
}

/// Persistence port for wallets, the ledger, orders and withdrawals.
///
/// `commit` must be all-or-nothing. It fails with
/// [`LedgerError::ConcurrencyConflict`](crate::error::LedgerError::ConcurrencyConflict)
/// on a stale wallet version or an already settled order or withdrawal, and with
/// [`LedgerError::DuplicateOperation`](crate::error::LedgerError::DuplicateOperation)
/// when an entry's reference is already recorded for its wallet.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn next_id(&self, sequence: Sequence) -> Result<u64>;

    /// Inserts an empty wallet unless one exists, returning the stored wallet.
    async fn create_wallet(&self, user: UserId) -> Result<Wallet>;
    async fn wallet(&self, user: UserId) -> Result<Option<Wallet>>;
    async fn wallets(&self) -> Result<Vec<Wallet>>;

    async fn entries(&self, user: UserId) -> Result<Vec<LedgerEntry>>;
    async fn entry_by_reference(&self, user: UserId, reference: &str)
    -> Result<Option<LedgerEntry>>;

    async fn order(&self, id: u64) -> Result<Option<Order>>;
    async fn orders(&self, user: UserId) -> Result<Vec<Order>>;

    async fn withdrawal(&self, id: u64) -> Result<Option<Withdrawal>>;
    async fn withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>>;

    async fn commit(&self, settlement: Settlement) -> Result<()>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;
