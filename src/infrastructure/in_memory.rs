use crate::domain::UserId;
use crate::domain::ledger::LedgerEntry;
use crate::domain::order::Order;
use crate::domain::ports::{LedgerStore, Sequence, Settlement};
use crate::domain::wallet::Wallet;
use crate::domain::withdrawal::Withdrawal;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    wallets: HashMap<UserId, Wallet>,
    entries: HashMap<UserId, Vec<LedgerEntry>>,
    references: HashMap<(UserId, String), u64>,
    orders: HashMap<u64, Order>,
    withdrawals: HashMap<u64, Withdrawal>,
}

#[derive(Default)]
struct Sequences {
    entry: AtomicU64,
    order: AtomicU64,
    withdrawal: AtomicU64,
}

/// A thread-safe in-memory ledger store.
///
/// All tables live behind one `RwLock`, so a commit validates and applies a
/// settlement under a single write guard. Cloning shares the same state.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<State>>,
    sequences: Arc<Sequences>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn next_id(&self, sequence: Sequence) -> Result<u64> {
        let counter = match sequence {
            Sequence::Entry => &self.sequences.entry,
            Sequence::Order => &self.sequences.order,
            Sequence::Withdrawal => &self.sequences.withdrawal,
        };
        Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn create_wallet(&self, user: UserId) -> Result<Wallet> {
        let mut state = self.state.write().await;
        Ok(state
            .wallets
            .entry(user)
            .or_insert_with(|| Wallet::new(user))
            .clone())
    }

    async fn wallet(&self, user: UserId) -> Result<Option<Wallet>> {
        let state = self.state.read().await;
        Ok(state.wallets.get(&user).cloned())
    }

    async fn wallets(&self) -> Result<Vec<Wallet>> {
        let state = self.state.read().await;
        Ok(state.wallets.values().cloned().collect())
    }

    async fn entries(&self, user: UserId) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        Ok(state.entries.get(&user).cloned().unwrap_or_default())
    }

    async fn entry_by_reference(
        &self,
        user: UserId,
        reference: &str,
    ) -> Result<Option<LedgerEntry>> {
        let state = self.state.read().await;
        let Some(id) = state.references.get(&(user, reference.to_string())) else {
            return Ok(None);
        };
        Ok(state
            .entries
            .get(&user)
            .and_then(|entries| entries.iter().find(|e| e.id == *id))
            .cloned())
    }

    async fn order(&self, id: u64) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn orders(&self, user: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.user == user)
            .cloned()
            .collect())
    }

    async fn withdrawal(&self, id: u64) -> Result<Option<Withdrawal>> {
        let state = self.state.read().await;
        Ok(state.withdrawals.get(&id).cloned())
    }

    async fn withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>> {
        let state = self.state.read().await;
        Ok(state
            .withdrawals
            .values()
            .filter(|w| w.user == user)
            .cloned()
            .collect())
    }

    async fn commit(&self, settlement: Settlement) -> Result<()> {
        let mut state = self.state.write().await;

        for wallet in &settlement.wallets {
            let stored = state
                .wallets
                .get(&wallet.user)
                .ok_or_else(|| LedgerError::not_found(format!("wallet {}", wallet.user)))?;
            if stored.version != wallet.version {
                return Err(LedgerError::ConcurrencyConflict(wallet.user));
            }
        }
        for order in &settlement.orders {
            if state.orders.get(&order.id).is_some_and(|o| o.status.is_terminal()) {
                return Err(LedgerError::ConcurrencyConflict(order.user));
            }
        }
        for withdrawal in &settlement.withdrawals {
            if state
                .withdrawals
                .get(&withdrawal.id)
                .is_some_and(|w| w.status.is_terminal())
            {
                return Err(LedgerError::ConcurrencyConflict(withdrawal.user));
            }
        }
        for entry in &settlement.entries {
            if let Some(reference) = &entry.reference
                && let Some(existing) = state.references.get(&(entry.user, reference.clone()))
            {
                return Err(LedgerError::DuplicateOperation {
                    reference: reference.clone(),
                    entry: *existing,
                });
            }
        }

        for mut wallet in settlement.wallets {
            wallet.version += 1;
            state.wallets.insert(wallet.user, wallet);
        }
        for entry in settlement.entries {
            if let Some(reference) = &entry.reference {
                state
                    .references
                    .insert((entry.user, reference.clone()), entry.id);
            }
            state.entries.entry(entry.user).or_default().push(entry);
        }
        for order in settlement.orders {
            state.orders.insert(order.id, order);
        }
        for withdrawal in settlement.withdrawals {
            state.withdrawals.insert(withdrawal.id, withdrawal);
        }
        Ok(())
    }
}
