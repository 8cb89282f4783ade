use crate::domain::UserId;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A wallet balance. Never negative once it has gone through a settlement.
///
/// Wraps `rust_decimal::Decimal` so that balances only move through
/// [`Balance::checked_add`] and [`Balance::checked_sub`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(Decimal);

/// A strictly positive monetary amount carried by a settlement operation.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidAmount(format!(
                "amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Adds `amount`, or returns `None` if the result exceeds `Decimal::MAX`.
    pub fn checked_add(self, amount: Amount) -> Option<Self> {
        self.0.checked_add(amount.0).map(Self)
    }

    /// Subtracts `amount`, or returns `None` if the result would be negative.
    pub fn checked_sub(self, amount: Amount) -> Option<Self> {
        if self.0 >= amount.0 {
            Some(Self(self.0 - amount.0))
        } else {
            None
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.normalize(), f)
    }
}

/// The single balance owned by a user.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub user: UserId,
    pub balance: Balance,
    /// Bumped by every commit; stores reject writes based on a stale version.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            balance: Balance::ZERO,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Credits the balance, leaving it untouched if the sum is not representable.
    pub fn credit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            LedgerError::InvalidAmount(format!(
                "crediting {amount} overflows the balance of wallet {}",
                self.user
            ))
        })?;
        Ok(())
    }

    /// Debits the balance if it covers `amount`, leaving it untouched otherwise.
    pub fn debit(&mut self, amount: Amount) -> Result<()> {
        match self.balance.checked_sub(amount) {
            Some(balance) => {
                self.balance = balance;
                Ok(())
            }
            None => Err(LedgerError::InsufficientFunds {
                user: self.user,
                balance: self.balance.value(),
                requested: amount.value(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(0.0001)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_amount_rejects_non_positive_json() {
        assert!(serde_json::from_str::<Amount>("\"5.5\"").is_ok());
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
    }

    #[test]
    fn test_balance_checked_sub() {
        let balance = Balance::new(dec!(10.0));
        let five = Amount::new(dec!(5.0)).unwrap();
        let eleven = Amount::new(dec!(11.0)).unwrap();
        assert_eq!(balance.checked_sub(five), Some(Balance::new(dec!(5.0))));
        assert_eq!(balance.checked_sub(eleven), None);
        assert_eq!(balance.checked_add(five), Some(Balance::new(dec!(15.0))));
    }

    #[test]
    fn test_wallet_credit_and_debit() {
        let mut wallet = Wallet::new(1);
        wallet.credit(Amount::new(dec!(10.0)).unwrap()).unwrap();
        assert_eq!(wallet.balance, Balance::new(dec!(10.0)));

        wallet.debit(Amount::new(dec!(4.0)).unwrap()).unwrap();
        assert_eq!(wallet.balance, Balance::new(dec!(6.0)));
    }

    #[test]
    fn test_wallet_debit_insufficient() {
        let mut wallet = Wallet::new(1);
        wallet.credit(Amount::new(dec!(10.0)).unwrap()).unwrap();

        let result = wallet.debit(Amount::new(dec!(20.0)).unwrap());
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds { user: 1, .. })
        ));
        assert_eq!(wallet.balance, Balance::new(dec!(10.0)));
    }

    #[test]
    fn test_wallet_credit_overflow_is_rejected() {
        let mut wallet = Wallet::new(1);
        wallet.credit(Amount::new(Decimal::MAX).unwrap()).unwrap();

        let result = wallet.credit(Amount::new(dec!(1)).unwrap());
        assert!(matches!(result, Err(LedgerError::InvalidAmount(_))));
        assert_eq!(wallet.balance, Balance::new(Decimal::MAX));
    }

    #[test]
    fn test_balance_display_is_normalized() {
        assert_eq!(Balance::new(dec!(1.5000)).to_string(), "1.5");
        assert_eq!(Balance::new(dec!(100.00)).to_string(), "100");
    }
}
