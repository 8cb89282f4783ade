use crate::domain::UserId;
use crate::domain::wallet::Wallet;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct WalletRow {
    user: UserId,
    balance: Decimal,
}

/// Writes wallet balances as `user,balance` CSV rows.
pub struct WalletWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per wallet with trailing zeros stripped, then flushes.
    pub fn write_wallets(&mut self, wallets: impl IntoIterator<Item = Wallet>) -> Result<()> {
        for wallet in wallets {
            self.writer.serialize(WalletRow {
                user: wallet.user,
                balance: wallet.balance.value().normalize(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
