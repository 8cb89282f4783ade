use crate::domain::UserId;
use crate::domain::wallet::Amount;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum WithdrawalStatus {
    Requested,
    Accepted,
    Rejected,
}

impl WithdrawalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WithdrawalStatus::Requested)
    }
}

/// A payout request. Funds leave the wallet when it is requested and come
/// back only if an administrator rejects it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Withdrawal {
    pub id: u64,
    pub user: UserId,
    pub amount: Amount,
    pub status: WithdrawalStatus,
    pub requested_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    pub fn new(id: u64, user: UserId, amount: Amount) -> Self {
        Self {
            id,
            user,
            amount,
            status: WithdrawalStatus::Requested,
            requested_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub(crate) fn resolve(&mut self, accept: bool) -> Result<()> {
        if self.status.is_terminal() {
            return Err(LedgerError::InvalidState(format!(
                "withdrawal {} is already {:?}",
                self.id, self.status
            )));
        }
        self.status = if accept {
            WithdrawalStatus::Accepted
        } else {
            WithdrawalStatus::Rejected
        };
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_withdrawal_resolves_once() {
        let mut withdrawal = Withdrawal::new(1, 1, Amount::new(dec!(10)).unwrap());
        withdrawal.resolve(false).unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Rejected);
        assert!(withdrawal.resolved_at.is_some());

        assert!(matches!(
            withdrawal.resolve(true),
            Err(LedgerError::InvalidState(_))
        ));
        assert_eq!(withdrawal.status, WithdrawalStatus::Rejected);
    }
}
