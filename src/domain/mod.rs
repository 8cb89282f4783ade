//! Domain model of the wallet ledger: balances, ledger entries, orders,
//! withdrawals, and the storage port they are persisted through.

pub mod ledger;
pub mod order;
pub mod ports;
pub mod wallet;
pub mod withdrawal;

/// Identifier supplied by the auth layer. One wallet per user.
pub type UserId = u64;
