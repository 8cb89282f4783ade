use crate::domain::UserId;
use crate::domain::wallet::Amount;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

/// A trade request priced with the market snapshot taken when it was placed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: u64,
    pub user: UserId,
    pub asset: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: u64,
        user: UserId,
        asset: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Self> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "order quantity must be positive, got {quantity}"
            )));
        }
        if price <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(format!(
                "order price must be positive, got {price}"
            )));
        }
        if quantity.checked_mul(price).is_none() {
            return Err(LedgerError::InvalidAmount(format!(
                "order cost of {quantity} at {price} is not representable"
            )));
        }
        Ok(Self {
            id,
            user,
            asset: asset.into(),
            side,
            quantity,
            price,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        })
    }

    /// Price times quantity, the amount a BUY must pay.
    pub fn cost(&self) -> Result<Decimal> {
        self.quantity.checked_mul(self.price).ok_or_else(|| {
            LedgerError::InvalidAmount(format!("cost of order {} overflows", self.id))
        })
    }

    /// Whether `amount` settles this order exactly.
    pub fn matches_payment(&self, amount: Amount) -> bool {
        self.quantity.checked_mul(self.price) == Some(amount.value())
    }

    pub(crate) fn transition(&mut self, status: OrderStatus) -> Result<()> {
        if self.status.is_terminal() {
            return Err(LedgerError::InvalidState(format!(
                "order {} is already {:?}",
                self.id, self.status
            )));
        }
        self.status = status;
        Ok(())
    }
}
