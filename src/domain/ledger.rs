use crate::domain::UserId;
use crate::domain::wallet::Amount;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
    OrderPayment,
}

impl EntryType {
    pub fn is_credit(&self) -> bool {
        matches!(self, EntryType::Deposit | EntryType::TransferIn)
    }
}

/// One immutable, balance-affecting event on a wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub id: u64,
    pub user: UserId,
    pub kind: EntryType,
    pub amount: Amount,
    /// Gateway payment reference. Unique per wallet when present.
    pub reference: Option<String>,
    pub purpose: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(id: u64, user: UserId, kind: EntryType, amount: Amount, purpose: String) -> Self {
        Self {
            id,
            user,
            kind,
            amount,
            reference: None,
            purpose,
            timestamp: Utc::now(),
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The entry's effect on the wallet balance.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount.value()
        } else {
            -self.amount.value()
        }
    }
}

/// Recomputes a balance from the wallet's ledger history.
pub fn replay<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Result<Decimal> {
    entries.into_iter().try_fold(Decimal::ZERO, |total, entry| {
        total.checked_add(entry.signed_amount()).ok_or_else(|| {
            LedgerError::InvalidAmount(format!("ledger replay overflows at entry {}", entry.id))
        })
    })
}

/// Orders entries for display: newest first, later ids first on equal timestamps.
pub fn sort_newest_first(entries: &mut [LedgerEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}
