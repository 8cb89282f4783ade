use crate::application::ledger::LedgerService;
use crate::domain::UserId;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Buy,
    Approve,
    Reject,
}

/// One row of a command stream.
///
/// Columns: `type, user, target, amount, reference, asset, quantity, price`.
/// Which columns are required depends on the command type; for `approve` and
/// `reject` the `reference` column holds the withdrawal id.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct LedgerCommand {
    pub r#type: CommandType,
    pub user: Option<UserId>,
    pub target: Option<UserId>,
    pub amount: Option<Decimal>,
    pub reference: Option<String>,
    pub asset: Option<String>,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
}

fn require<T>(value: Option<T>, command: CommandType, column: &str) -> Result<T> {
    value.ok_or_else(|| {
        LedgerError::InvalidCommand(format!("{command:?} requires the {column} column"))
    })
}

impl LedgerCommand {
    /// Runs the command against the ledger.
    pub async fn apply(self, service: &LedgerService) -> Result<()> {
        let kind = self.r#type;
        match kind {
            CommandType::Open => {
                service.open_wallet(require(self.user, kind, "user")?).await?;
            }
            CommandType::Deposit => {
                let reference = require(self.reference, kind, "reference")?;
                service
                    .deposit(
                        require(self.user, kind, "user")?,
                        require(self.amount, kind, "amount")?,
                        &reference,
                    )
                    .await?;
            }
            CommandType::Withdraw => {
                service
                    .withdraw(
                        require(self.user, kind, "user")?,
                        require(self.amount, kind, "amount")?,
                    )
                    .await?;
            }
            CommandType::Transfer => {
                service
                    .transfer(
                        require(self.user, kind, "user")?,
                        require(self.target, kind, "target")?,
                        require(self.amount, kind, "amount")?,
                    )
                    .await?;
            }
            CommandType::Buy => {
                let asset = require(self.asset, kind, "asset")?;
                service
                    .execute_order(
                        require(self.user, kind, "user")?,
                        &asset,
                        require(self.quantity, kind, "quantity")?,
                        require(self.price, kind, "price")?,
                    )
                    .await?;
            }
            CommandType::Approve | CommandType::Reject => {
                let reference = require(self.reference, kind, "reference")?;
                let id = reference.parse::<u64>().map_err(|_| {
                    LedgerError::InvalidCommand(format!("'{reference}' is not a withdrawal id"))
                })?;
                service
                    .resolve_withdrawal(id, kind == CommandType::Approve)
                    .await?;
            }
        }
        Ok(())
    }
}
