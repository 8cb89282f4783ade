use crate::domain::UserId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Exclusive access to a wallet, released on drop.
pub type WalletGuard = OwnedMutexGuard<()>;

/// Per-wallet mutual exclusion.
///
/// Operations on the same wallet queue on its mutex; different wallets never
/// contend. Mutexes are created on first use and kept for the lifetime of the
/// service.
#[derive(Default)]
pub struct WalletLocks {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl WalletLocks {
    pub fn new() -> Self {
        Self::default()
    }

    // The DashMap shard guard must not live across an await.
    fn handle(&self, user: UserId) -> Arc<Mutex<()>> {
        self.locks.entry(user).or_default().value().clone()
    }

    pub async fn lock(&self, user: UserId) -> WalletGuard {
        self.handle(user).lock_owned().await
    }

    /// Locks two distinct wallets, lower user id first, and returns the guards
    /// in argument order.
    pub async fn lock_pair(&self, a: UserId, b: UserId) -> (WalletGuard, WalletGuard) {
        debug_assert_ne!(a, b);
        if a < b {
            let first = self.lock(a).await;
            let second = self.lock(b).await;
            (first, second)
        } else {
            let first = self.lock(b).await;
            let second = self.lock(a).await;
            (second, first)
        }
    }
}
