//! Application layer containing the settlement logic.
//!
//! `LedgerService` is the entry point for every balance-affecting operation.
//! It serializes work per wallet with `WalletLocks` and commits each
//! operation through the store as one atomic `Settlement`.

pub mod ledger;
pub mod locks;
