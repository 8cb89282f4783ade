use crate::application::locks::WalletLocks;
use crate::config::LedgerConfig;
use crate::domain::UserId;
use crate::domain::ledger::{self, EntryType, LedgerEntry};
use crate::domain::order::{Order, OrderSide, OrderStatus};
use crate::domain::ports::{LedgerStoreBox, Sequence, Settlement};
use crate::domain::wallet::{Amount, Wallet};
use crate::domain::withdrawal::Withdrawal;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use std::future::Future;
use tracing::{debug, info, warn};

/// Result of a gateway deposit.
#[derive(Debug, Clone, PartialEq)]
pub enum DepositOutcome {
    /// The wallet was credited by this call.
    Applied(LedgerEntry),
    /// The reference was already settled; this is the entry recorded then.
    Duplicate(LedgerEntry),
}

impl DepositOutcome {
    pub fn entry(&self) -> &LedgerEntry {
        match self {
            DepositOutcome::Applied(entry) | DepositOutcome::Duplicate(entry) => entry,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DepositOutcome::Duplicate(_))
    }
}

/// The two legs of a completed transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub outgoing: LedgerEntry,
    pub incoming: LedgerEntry,
}

/// The wallet ledger service.
///
/// Every settlement operation takes the wallet's lock, reads current state,
/// and hands the store one [`Settlement`] holding the new balances together
/// with the ledger entries explaining them. Stale-version conflicts reported
/// by the store are retried up to [`LedgerConfig::max_retries`] times.
///
/// Callers are trusted: user ids come from the auth layer and
/// [`resolve_withdrawal`](Self::resolve_withdrawal) must only be reachable by
/// administrators.
pub struct LedgerService {
    store: LedgerStoreBox,
    locks: WalletLocks,
    config: LedgerConfig,
}

impl LedgerService {
    /// Creates a service with the default retry policy.
    pub fn new(store: LedgerStoreBox) -> Self {
        Self::with_config(store, LedgerConfig::default())
    }

    pub fn with_config(store: LedgerStoreBox, config: LedgerConfig) -> Self {
        Self {
            store,
            locks: WalletLocks::new(),
            config,
        }
    }

    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(LedgerError::ConcurrencyConflict(user)) if retries < self.config.max_retries => {
                    retries += 1;
                    warn!(operation, user, retries, "Concurrent wallet update, retrying");
                    tokio::time::sleep(self.config.backoff(retries)).await;
                }
                result => return result,
            }
        }
    }

    async fn load_wallet(&self, user: UserId) -> Result<Wallet> {
        self.store
            .wallet(user)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("wallet {user}")))
    }

    async fn new_entry(
        &self,
        user: UserId,
        kind: EntryType,
        amount: Amount,
        purpose: String,
    ) -> Result<LedgerEntry> {
        let id = self.store.next_id(Sequence::Entry).await?;
        Ok(LedgerEntry::new(id, user, kind, amount, purpose))
    }

    /// Opens the wallet of a newly created account. Opening an existing
    /// wallet returns it unchanged.
    pub async fn open_wallet(&self, user: UserId) -> Result<Wallet> {
        let wallet = self.store.create_wallet(user).await?;
        debug!(user, "Wallet open");
        Ok(wallet)
    }

    /// Credits a confirmed gateway payment.
    ///
    /// `reference` is the gateway's payment id. A reference already recorded
    /// for this wallet is not credited again; the original entry is returned.
    pub async fn deposit(
        &self,
        user: UserId,
        amount: Decimal,
        reference: &str,
    ) -> Result<DepositOutcome> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.lock(user).await;
        self.retrying("deposit", move || self.try_deposit(user, amount, reference))
            .await
            .inspect_err(|e| warn!(user, %amount, reference, error = %e, "Deposit rejected"))
    }

    async fn try_deposit(
        &self,
        user: UserId,
        amount: Amount,
        reference: &str,
    ) -> Result<DepositOutcome> {
        if let Some(prior) = self.store.entry_by_reference(user, reference).await? {
            info!(user, reference, entry = prior.id, "Duplicate deposit ignored");
            return Ok(DepositOutcome::Duplicate(prior));
        }

        let mut wallet = self.load_wallet(user).await?;
        wallet.credit(amount)?;
        let entry = self
            .new_entry(user, EntryType::Deposit, amount, format!("deposit {reference}"))
            .await?
            .with_reference(reference);

        let settlement = Settlement::new().wallet(wallet).entry(entry.clone());
        match self.store.commit(settlement).await {
            Ok(()) => {
                info!(user, %amount, reference, entry = entry.id, "Deposit applied");
                Ok(DepositOutcome::Applied(entry))
            }
            Err(LedgerError::DuplicateOperation { entry: id, .. }) => {
                let prior = self
                    .store
                    .entry_by_reference(user, reference)
                    .await?
                    .ok_or_else(|| LedgerError::not_found(format!("ledger entry {id}")))?;
                info!(user, reference, entry = id, "Duplicate deposit ignored");
                Ok(DepositOutcome::Duplicate(prior))
            }
            Err(e) => Err(e),
        }
    }

    /// Takes funds out of the wallet and files a withdrawal request for an
    /// administrator to resolve.
    pub async fn withdraw(&self, user: UserId, amount: Decimal) -> Result<Withdrawal> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.lock(user).await;
        self.retrying("withdraw", move || self.try_withdraw(user, amount))
            .await
            .inspect_err(|e| warn!(user, %amount, error = %e, "Withdrawal rejected"))
    }

    async fn try_withdraw(&self, user: UserId, amount: Amount) -> Result<Withdrawal> {
        let mut wallet = self.load_wallet(user).await?;
        wallet.debit(amount)?;

        let id = self.store.next_id(Sequence::Withdrawal).await?;
        let withdrawal = Withdrawal::new(id, user, amount);
        let entry = self
            .new_entry(user, EntryType::Withdrawal, amount, format!("withdrawal {id}"))
            .await?;

        self.store
            .commit(
                Settlement::new()
                    .wallet(wallet)
                    .entry(entry)
                    .withdrawal(withdrawal.clone()),
            )
            .await?;
        info!(user, %amount, withdrawal = id, "Withdrawal requested");
        Ok(withdrawal)
    }

    /// Moves funds between two wallets in one atomic unit.
    pub async fn transfer(&self, from: UserId, to: UserId, amount: Decimal) -> Result<TransferReceipt> {
        let amount = Amount::new(amount)?;
        if from == to {
            return Err(LedgerError::InvalidTarget(format!(
                "wallet {from} cannot transfer to itself"
            )));
        }
        let _guards = self.locks.lock_pair(from, to).await;
        self.retrying("transfer", move || self.try_transfer(from, to, amount))
            .await
            .inspect_err(|e| warn!(from, to, %amount, error = %e, "Transfer rejected"))
    }

    async fn try_transfer(&self, from: UserId, to: UserId, amount: Amount) -> Result<TransferReceipt> {
        let mut sender = self.load_wallet(from).await?;
        let mut recipient = self
            .store
            .wallet(to)
            .await?
            .ok_or_else(|| LedgerError::InvalidTarget(format!("wallet {to} does not exist")))?;

        sender.debit(amount)?;
        recipient.credit(amount)?;

        let outgoing = self
            .new_entry(from, EntryType::TransferOut, amount, format!("transfer to {to}"))
            .await?;
        let incoming = self
            .new_entry(to, EntryType::TransferIn, amount, format!("transfer from {from}"))
            .await?;

        self.store
            .commit(
                Settlement::new()
                    .wallet(sender)
                    .wallet(recipient)
                    .entry(outgoing.clone())
                    .entry(incoming.clone()),
            )
            .await?;
        info!(from, to, %amount, "Transfer applied");
        Ok(TransferReceipt { outgoing, incoming })
    }

    /// Records a PENDING order priced at the market snapshot `price`.
    pub async fn place_order(
        &self,
        user: UserId,
        asset: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Order> {
        let _guard = self.locks.lock(user).await;
        self.load_wallet(user).await?;
        let id = self.store.next_id(Sequence::Order).await?;
        let order = Order::new(id, user, asset, side, quantity, price)?;
        self.store.commit(Settlement::new().order(order.clone())).await?;
        info!(user, order = id, asset, ?side, %quantity, %price, "Order placed");
        Ok(order)
    }

    /// Pays for a PENDING BUY order.
    ///
    /// If `amount` is not exactly quantity times the price snapshot the order
    /// is marked FAILED and the wallet is left alone. On
    /// [`LedgerError::InsufficientFunds`] the order stays PENDING.
    pub async fn pay_order(&self, user: UserId, order_id: u64, amount: Decimal) -> Result<Order> {
        let amount = Amount::new(amount)?;
        let _guard = self.locks.lock(user).await;
        self.retrying("pay_order", move || self.try_pay_order(user, order_id, amount))
            .await
            .inspect_err(|e| warn!(user, order = order_id, %amount, error = %e, "Order payment rejected"))
    }

    async fn try_pay_order(&self, user: UserId, order_id: u64, amount: Amount) -> Result<Order> {
        let mut order = self.owned_order(user, order_id).await?;
        if order.side != OrderSide::Buy {
            return Err(LedgerError::InvalidState(format!(
                "order {order_id} is a sell order"
            )));
        }
        if order.status.is_terminal() {
            return Err(LedgerError::InvalidState(format!(
                "order {order_id} is already {:?}",
                order.status
            )));
        }

        if !order.matches_payment(amount) {
            order.transition(OrderStatus::Failed)?;
            self.store.commit(Settlement::new().order(order.clone())).await?;
            warn!(
                user,
                order = order_id,
                %amount,
                quantity = %order.quantity,
                price = %order.price,
                "Order payment does not match price and quantity, order failed"
            );
            return Ok(order);
        }

        let mut wallet = self.load_wallet(user).await?;
        wallet.debit(amount)?;
        let entry = self
            .new_entry(user, EntryType::OrderPayment, amount, order_purpose(&order))
            .await?;
        order.transition(OrderStatus::Success)?;

        self.store
            .commit(Settlement::new().wallet(wallet).entry(entry).order(order.clone()))
            .await?;
        info!(user, order = order_id, %amount, "Order paid");
        Ok(order)
    }

    /// Places a BUY order at `price` and pays for it in one atomic unit.
    ///
    /// Nothing is recorded when the wallet cannot cover the cost.
    pub async fn execute_order(
        &self,
        user: UserId,
        asset: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Order> {
        let _guard = self.locks.lock(user).await;
        self.retrying("execute_order", move || {
            self.try_execute_order(user, asset, quantity, price)
        })
        .await
        .inspect_err(|e| warn!(user, asset, %quantity, %price, error = %e, "Order execution rejected"))
    }

    async fn try_execute_order(
        &self,
        user: UserId,
        asset: &str,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<Order> {
        let mut wallet = self.load_wallet(user).await?;
        let id = self.store.next_id(Sequence::Order).await?;
        let mut order = Order::new(id, user, asset, OrderSide::Buy, quantity, price)?;
        let amount = Amount::new(order.cost()?)?;

        wallet.debit(amount)?;
        let entry = self
            .new_entry(user, EntryType::OrderPayment, amount, order_purpose(&order))
            .await?;
        order.transition(OrderStatus::Success)?;

        self.store
            .commit(Settlement::new().wallet(wallet).entry(entry).order(order.clone()))
            .await?;
        info!(user, order = id, asset, %amount, "Order executed");
        Ok(order)
    }

    /// Cancels a PENDING order. No balance change.
    pub async fn cancel_order(&self, user: UserId, order_id: u64) -> Result<Order> {
        let _guard = self.locks.lock(user).await;
        self.retrying("cancel_order", move || self.try_cancel_order(user, order_id))
            .await
    }

    async fn try_cancel_order(&self, user: UserId, order_id: u64) -> Result<Order> {
        let mut order = self.owned_order(user, order_id).await?;
        order.transition(OrderStatus::Cancelled)?;
        self.store.commit(Settlement::new().order(order.clone())).await?;
        info!(user, order = order_id, "Order cancelled");
        Ok(order)
    }

    async fn owned_order(&self, user: UserId, order_id: u64) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .filter(|o| o.user == user)
            .ok_or_else(|| LedgerError::not_found(format!("order {order_id}")))
    }

    /// Administrator decision on a REQUESTED withdrawal.
    ///
    /// Rejecting refunds the amount with a DEPOSIT entry naming the
    /// withdrawal. Accepting only records the decision, since the funds left
    /// the wallet when the withdrawal was requested.
    pub async fn resolve_withdrawal(&self, withdrawal_id: u64, accept: bool) -> Result<Withdrawal> {
        let user = self.load_withdrawal(withdrawal_id).await?.user;
        let _guard = self.locks.lock(user).await;
        self.retrying("resolve_withdrawal", move || {
            self.try_resolve_withdrawal(withdrawal_id, accept)
        })
        .await
        .inspect_err(|e| {
            warn!(withdrawal = withdrawal_id, accept, error = %e, "Withdrawal resolution rejected")
        })
    }

    async fn try_resolve_withdrawal(&self, withdrawal_id: u64, accept: bool) -> Result<Withdrawal> {
        let mut withdrawal = self.load_withdrawal(withdrawal_id).await?;
        withdrawal.resolve(accept)?;

        let mut settlement = Settlement::new();
        if !accept {
            let mut wallet = self.load_wallet(withdrawal.user).await?;
            wallet.credit(withdrawal.amount)?;
            let entry = self
                .new_entry(
                    withdrawal.user,
                    EntryType::Deposit,
                    withdrawal.amount,
                    format!("refund of rejected withdrawal {withdrawal_id}"),
                )
                .await?;
            settlement = settlement.wallet(wallet).entry(entry);
        }
        self.store
            .commit(settlement.withdrawal(withdrawal.clone()))
            .await?;
        info!(
            user = withdrawal.user,
            withdrawal = withdrawal_id,
            status = ?withdrawal.status,
            "Withdrawal resolved"
        );
        Ok(withdrawal)
    }

    async fn load_withdrawal(&self, withdrawal_id: u64) -> Result<Withdrawal> {
        self.store
            .withdrawal(withdrawal_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("withdrawal {withdrawal_id}")))
    }

    pub async fn wallet(&self, user: UserId) -> Result<Wallet> {
        self.load_wallet(user).await
    }

    /// All wallets, ordered by user id.
    pub async fn wallets(&self) -> Result<Vec<Wallet>> {
        let mut wallets = self.store.wallets().await?;
        wallets.sort_by_key(|w| w.user);
        Ok(wallets)
    }

    /// Ledger history of a wallet, newest first, optionally of one type.
    pub async fn transactions(
        &self,
        user: UserId,
        kind: Option<EntryType>,
    ) -> Result<Vec<LedgerEntry>> {
        self.load_wallet(user).await?;
        let mut entries = self.store.entries(user).await?;
        if let Some(kind) = kind {
            entries.retain(|e| e.kind == kind);
        }
        ledger::sort_newest_first(&mut entries);
        Ok(entries)
    }

    /// The balance implied by replaying the wallet's ledger.
    pub async fn ledger_balance(&self, user: UserId) -> Result<Decimal> {
        self.load_wallet(user).await?;
        ledger::replay(&self.store.entries(user).await?)
    }

    pub async fn order(&self, order_id: u64) -> Result<Order> {
        self.store
            .order(order_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("order {order_id}")))
    }

    /// Orders of a user, newest first, optionally narrowed by side and asset.
    pub async fn orders(
        &self,
        user: UserId,
        side: Option<OrderSide>,
        asset: Option<&str>,
    ) -> Result<Vec<Order>> {
        let mut orders = self.store.orders(user).await?;
        orders.retain(|o| side.is_none_or(|s| o.side == s) && asset.is_none_or(|a| o.asset == a));
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    pub async fn withdrawal(&self, withdrawal_id: u64) -> Result<Withdrawal> {
        self.load_withdrawal(withdrawal_id).await
    }

    /// Withdrawal history of a user, newest first.
    pub async fn withdrawals(&self, user: UserId) -> Result<Vec<Withdrawal>> {
        let mut withdrawals = self.store.withdrawals(user).await?;
        withdrawals.sort_by(|a, b| b.requested_at.cmp(&a.requested_at).then(b.id.cmp(&a.id)));
        Ok(withdrawals)
    }
}

fn order_purpose(order: &Order) -> String {
    format!(
        "order {}: buy {} {} at {}",
        order.id, order.quantity, order.asset, order.price
    )
}
