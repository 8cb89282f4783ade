use miette::Diagnostic;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::UserId;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug, Diagnostic)]
pub enum LedgerError {
    #[error("Insufficient funds in wallet {user}: balance {balance}, requested {requested}")]
    #[diagnostic(code(ledger::insufficient_funds))]
    InsufficientFunds {
        user: UserId,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("Invalid amount: {0}")]
    #[diagnostic(code(ledger::invalid_amount))]
    InvalidAmount(String),

    #[error("Invalid transfer target: {0}")]
    #[diagnostic(code(ledger::invalid_target))]
    InvalidTarget(String),

    /// Raised by stores when an external reference is already recorded for the
    /// wallet. The service turns it into the prior result.
    #[error("Reference {reference} already processed as ledger entry {entry}")]
    #[diagnostic(code(ledger::duplicate))]
    DuplicateOperation { reference: String, entry: u64 },

    #[error("{0} not found")]
    #[diagnostic(code(ledger::not_found))]
    NotFound(String),

    #[error("Concurrent modification of wallet {0}")]
    #[diagnostic(
        code(ledger::conflict),
        help("the operation was retried and can be submitted again")
    )]
    ConcurrencyConflict(UserId),

    #[error("Invalid state: {0}")]
    #[diagnostic(code(ledger::invalid_state))]
    InvalidState(String),

    #[error("Invalid command: {0}")]
    #[diagnostic(code(ledger::invalid_command))]
    InvalidCommand(String),

    #[error("CSV error: {0}")]
    #[diagnostic(code(ledger::csv))]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(ledger::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(ledger::serialization))]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    #[diagnostic(code(ledger::storage))]
    Storage(String),
}

impl LedgerError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Whether resubmitting the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        Self::Storage(e.into_string())
    }
}
