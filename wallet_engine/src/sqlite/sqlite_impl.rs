//! `SqliteDatabase` is the SQLite implementation of the wallet engine storage traits.
//!
//! Every method that writes runs as a single transaction wrapped in [`with_retry`]. Each attempt opens a fresh
//! transaction; an attempt that fails or times out drops its transaction, which rolls it back.
//!
//! Units of work that read before they write start by claiming the write lock (see [`accounts::lock_account`]), so
//! the rows they read stay valid until they commit.
use std::fmt::Debug;

use log::*;
use sqlx::{SqliteConnection, SqlitePool};
use wallet_common::Pesewas;

use super::db::{accounts, carts, db_url, ledger, new_pool, orders, products, reconciliation, top_ups};
use crate::{
    db_types::{
        references,
        Account,
        CartContents,
        CartItem,
        FulfillmentStatus,
        LedgerEntry,
        LedgerEntryType,
        NewAccount,
        NewLedgerEntry,
        NewOrder,
        NewOrderItem,
        NewProduct,
        NewTopUp,
        Order,
        OrderItem,
        OrderWithItems,
        Product,
        SettlementOutcome,
        TopUp,
        TopUpStatus,
        Transition,
    },
    helpers::{clean_dest_number, with_retry, RetryPolicy},
    traits::{
        AccountManagement,
        CartManagement,
        FulfillmentManagement,
        LedgerManagement,
        LoanManagement,
        ProductCatalog,
        ReconciliationQueries,
        SettlementManagement,
        TopUpManagement,
        WalletError,
    },
    wallet_api::{
        order_objects::{OrderQueryFilter, StatusChange},
        AuditLogEntry,
        AuditLogFilter,
        BalanceSummary,
        LedgerChainReport,
        LedgerQueryFilter,
        LoanOutcome,
        Page,
        StatusCount,
        TopUpResult,
        TransactionStatistics,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
    retry: RetryPolicy,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({}, {:?})", self.url, self.retry)
    }
}

impl SqliteDatabase {
    /// Connects to the database named by `WALLET_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        let retry = RetryPolicy::from_env_or_default();
        Ok(Self { url: url.to_string(), pool, retry })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded schema migrations. Migrations that have already run are skipped.
    pub async fn migrate(&self) -> Result<(), WalletError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| WalletError::DatabaseError(format!("Migration failed. {e}")))?;
        info!("🪛️ Database migrations are up to date");
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), WalletError> {
        self.pool.close().await;
        Ok(())
    }

    //------------------------------------------  Units of work  ------------------------------------------------------

    async fn insert_account_once(&self, account: NewAccount) -> Result<Account, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::insert_account(account, &mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn insert_product_once(&self, product: NewProduct) -> Result<Product, WalletError> {
        let mut tx = self.pool.begin().await?;
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn update_price_once(&self, product_id: i64, price: Pesewas) -> Result<Product, WalletError> {
        let mut tx = self.pool.begin().await?;
        let product = products::update_price(product_id, price, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn set_stock_once(&self, product_id: i64, stock: i64) -> Result<Product, WalletError> {
        let mut tx = self.pool.begin().await?;
        let product = products::set_stock(product_id, stock, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn apply_entry_once(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, WalletError> {
        let mut tx = self.pool.begin().await?;
        let entry = ledger::apply_ledger_entry(entry, &mut tx).await?;
        tx.commit().await?;
        Ok(entry)
    }

    async fn add_item_once(
        &self,
        account_id: i64,
        product_id: i64,
        quantity: i64,
        dest_number: Option<String>,
    ) -> Result<CartItem, WalletError> {
        let mut tx = self.pool.begin().await?;
        accounts::lock_account(account_id, &mut tx).await?;
        let product =
            products::fetch_product(product_id, &mut tx).await?.ok_or(WalletError::ProductNotFound(product_id))?;
        if !product.in_stock() {
            return Err(WalletError::ProductOutOfStock(product_id));
        }
        let cart = carts::fetch_or_create_cart(account_id, dest_number.as_deref(), &mut tx).await?;
        let price = line_price(product.price, quantity)?;
        let dest_number = dest_number.as_deref();
        let item = carts::insert_cart_item(cart.id, product_id, quantity, price, dest_number, &mut tx).await?;
        tx.commit().await?;
        Ok(item)
    }

    async fn remove_item_once(&self, cart_item_id: i64) -> Result<bool, WalletError> {
        let mut tx = self.pool.begin().await?;
        let removed = carts::delete_cart_item(cart_item_id, &mut tx).await?;
        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn clear_cart_once(&self, account_id: i64) -> Result<u64, WalletError> {
        let mut tx = self.pool.begin().await?;
        let removed = match carts::fetch_cart(account_id, &mut tx).await? {
            Some(cart) => carts::clear_cart_items(cart.id, &mut tx).await?,
            None => 0,
        };
        tx.commit().await?;
        Ok(removed)
    }

    async fn submit_cart_once(
        &self,
        account_id: i64,
        dest_number: Option<String>,
    ) -> Result<OrderWithItems, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::lock_account(account_id, &mut tx).await?;
        let contents = carts::fetch_cart_contents(account_id, &mut tx)
            .await?
            .filter(|c| !c.is_empty())
            .ok_or(WalletError::EmptyCart(account_id))?;
        if let Some(line) = contents.lines.iter().find(|l| !l.product.in_stock()) {
            return Err(WalletError::ProductOutOfStock(line.product.id));
        }
        let total =
            contents.current_total().ok_or_else(|| WalletError::validation("The cart total is too large to settle"))?;
        if account.loan_balance < total {
            return Err(WalletError::InsufficientBalance { account_id, balance: account.loan_balance, required: total });
        }
        let dest_number = dest_number.or_else(|| contents.cart.dest_number.clone());
        let order =
            orders::insert_order(NewOrder { account_id, dest_number, total_price: total }, &mut tx).await?;
        let mut items = Vec::with_capacity(contents.lines.len());
        for line in &contents.lines {
            let dest = line.item.dest_number.as_deref().or(order.dest_number.as_deref());
            let item = orders::insert_order_item(
                order.id,
                line.product.id,
                line.item.quantity,
                dest,
                line.current_price(),
                &mut tx,
            )
            .await?;
            items.push(item);
        }
        let debit = NewLedgerEntry::new(
            account_id,
            -total,
            LedgerEntryType::Order,
            format!("Order #{} for {} items", order.id, items.len()),
        )
        .with_reference(references::order(order.id));
        ledger::apply_ledger_entry(debit, &mut tx).await?;
        carts::clear_cart_items(contents.cart.id, &mut tx).await?;
        tx.commit().await?;
        info!("📦️ Order #{} settled for account #{account_id}. {total} debited.", order.id);
        Ok(OrderWithItems { order, items })
    }

    async fn create_direct_order_once(
        &self,
        account_id: i64,
        items: Vec<NewOrderItem>,
        total: Pesewas,
    ) -> Result<OrderWithItems, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::lock_account(account_id, &mut tx).await?;
        let mut priced = Vec::with_capacity(items.len());
        for item in items {
            let product = products::fetch_product(item.product_id, &mut tx)
                .await?
                .ok_or(WalletError::ProductNotFound(item.product_id))?;
            let price = match item.price {
                Some(price) => price,
                None => line_price(product.price, item.quantity)?,
            };
            priced.push((item, price));
        }
        if account.loan_balance < total {
            return Err(WalletError::InsufficientBalance { account_id, balance: account.loan_balance, required: total });
        }
        let new_order = NewOrder { account_id, dest_number: None, total_price: total };
        let order = orders::insert_order(new_order, &mut tx).await?;
        let mut order_items = Vec::with_capacity(priced.len());
        for (item, price) in priced {
            let order_item = orders::insert_order_item(
                order.id,
                item.product_id,
                item.quantity,
                item.dest_number.as_deref(),
                Some(price),
                &mut tx,
            )
            .await?;
            order_items.push(order_item);
        }
        let debit = NewLedgerEntry::new(
            account_id,
            -total,
            LedgerEntryType::Order,
            format!("Direct order #{} for {} items", order.id, order_items.len()),
        )
        .with_reference(references::order(order.id));
        ledger::apply_ledger_entry(debit, &mut tx).await?;
        tx.commit().await?;
        info!("📦️ Direct order #{} settled for account #{account_id}. {total} debited.", order.id);
        Ok(OrderWithItems { order, items: order_items })
    }

    async fn set_item_status_once(&self, item_id: i64, status: FulfillmentStatus) -> Result<StatusChange, WalletError> {
        let mut tx = self.pool.begin().await?;
        let item = orders::lock_order_item(item_id, &mut tx).await?;
        let order =
            orders::fetch_order(item.order_id, &mut tx).await?.ok_or(WalletError::OrderNotFound(item.order_id))?;
        let account_id = order.account_id;
        let transition = item.status.transition_to(status);
        if transition == Transition::Illegal {
            return Err(WalletError::IllegalStatusTransition { item_id, from: item.status, to: status });
        }
        let audit = NewLedgerEntry::new(
            account_id,
            Pesewas::default(),
            LedgerEntryType::OrderItemStatus,
            format!("Order item #{item_id} of order #{} is {status}", order.id),
        )
        .with_reference(references::order_item_status(item_id, status));
        if transition == Transition::Unchanged {
            ledger::apply_unless_exists(audit, &mut tx).await?;
            tx.commit().await?;
            debug!("🚚️ Order item #{item_id} is already {status}. Nothing to do.");
            return Ok(StatusChange { order, changed: Vec::new(), refund: None });
        }
        let changed = orders::update_item_status(&[item_id], status, &mut tx).await?;
        ledger::apply_unless_exists(audit, &mut tx).await?;
        let refund = if status == FulfillmentStatus::Cancelled {
            refund_single_item(account_id, &item, &mut tx).await?
        } else {
            None
        };
        let order = refresh_order_status(order, &mut tx).await?;
        tx.commit().await?;
        info!("🚚️ Order item #{item_id} moved from {} to {status}", item.status);
        Ok(StatusChange { order, changed, refund })
    }

    async fn set_order_items_status_once(
        &self,
        order_id: i64,
        status: FulfillmentStatus,
    ) -> Result<StatusChange, WalletError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(order_id, &mut tx).await?;
        let account_id = order.account_id;
        let items = orders::fetch_order_items(order_id, &mut tx).await?;
        let mut to_change = Vec::with_capacity(items.len());
        for item in &items {
            match item.status.transition_to(status) {
                Transition::Illegal => {
                    let (item_id, from) = (item.id, item.status);
                    return Err(WalletError::IllegalStatusTransition { item_id, from, to: status });
                },
                Transition::Unchanged => {},
                Transition::Allowed => to_change.push(item.id),
            }
        }
        let changed = orders::update_item_status(&to_change, status, &mut tx).await?;
        let audit = NewLedgerEntry::new(
            account_id,
            Pesewas::default(),
            LedgerEntryType::OrderItemsStatus,
            format!("All items of order #{order_id} are {status}"),
        )
        .with_reference(references::order_status(order_id, status));
        ledger::apply_unless_exists(audit, &mut tx).await?;
        let refund = if status == FulfillmentStatus::Cancelled {
            refund_order_items(account_id, order_id, &mut tx).await?
        } else {
            None
        };
        let order = orders::update_order_status(order_id, status, &mut tx).await?;
        tx.commit().await?;
        info!("🚚️ {} items of order #{order_id} moved to {status}", changed.len());
        Ok(StatusChange { order, changed, refund })
    }

    async fn set_order_status_once(&self, order_id: i64, status: FulfillmentStatus) -> Result<Order, WalletError> {
        if status == FulfillmentStatus::Cancelled {
            return Err(WalletError::validation(format!(
                "Order #{order_id} cannot be cancelled directly. Cancel its items so they are refunded."
            )));
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::lock_order(order_id, &mut tx).await?;
        let audit = NewLedgerEntry::new(
            order.account_id,
            Pesewas::default(),
            LedgerEntryType::OrderStatus,
            format!("Order #{order_id} status changed to {status}"),
        )
        .with_reference(references::order(order_id));
        ledger::apply_ledger_entry(audit, &mut tx).await?;
        let updated = orders::update_order_status(order_id, status, &mut tx).await?;
        tx.commit().await?;
        info!("🚚️ Order #{order_id} status set from {} to {status}", order.status);
        Ok(updated)
    }

    async fn complete_processing_items_once(&self) -> Result<Vec<OrderItem>, WalletError> {
        let mut tx = self.pool.begin().await?;
        let completed = orders::complete_processing_items(&mut tx).await?;
        let mut order_ids = completed.iter().map(|i| i.order_id).collect::<Vec<_>>();
        order_ids.sort_unstable();
        order_ids.dedup();
        for order_id in order_ids {
            let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(WalletError::OrderNotFound(order_id))?;
            for item in completed.iter().filter(|i| i.order_id == order_id) {
                let audit = NewLedgerEntry::new(
                    order.account_id,
                    Pesewas::default(),
                    LedgerEntryType::OrderItemStatus,
                    format!("Order item #{} of order #{order_id} is {}", item.id, item.status),
                )
                .with_reference(references::order_item_status(item.id, item.status));
                ledger::apply_unless_exists(audit, &mut tx).await?;
            }
            refresh_order_status(order, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(completed)
    }

    async fn assign_loan_once(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::lock_account(account_id, &mut tx).await?;
        let credit = NewLedgerEntry::new(
            account_id,
            amount,
            LedgerEntryType::LoanAssignment,
            format!("Loan of {amount} assigned"),
        )
        .with_reference(references::account(account_id));
        let entry = ledger::apply_ledger_entry(credit, &mut tx).await?;
        let principal = account.admin_loan_balance + amount;
        let account = accounts::set_loan_state(account_id, principal, true, &mut tx).await?;
        tx.commit().await?;
        info!("🏦️ Loan of {amount} assigned to account #{account_id}. Outstanding principal is {principal}");
        Ok(LoanOutcome { account, entry })
    }

    async fn repay_loan_once(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::lock_account(account_id, &mut tx).await?;
        let debit = amount.min(account.loan_balance.max(Pesewas::default()));
        let repayment = NewLedgerEntry::new(
            account_id,
            -debit,
            LedgerEntryType::LoanRepayment,
            format!("Loan repayment of {amount}"),
        )
        .with_reference(references::account(account_id));
        let entry = ledger::apply_ledger_entry(repayment, &mut tx).await?;
        let principal = (account.admin_loan_balance - amount).max(Pesewas::default());
        let account = accounts::set_loan_state(account_id, principal, principal.is_positive(), &mut tx).await?;
        tx.commit().await?;
        info!("🏦️ Account #{account_id} repaid {debit} of a requested {amount}. Outstanding principal is {principal}");
        Ok(LoanOutcome { account, entry })
    }

    async fn deduct_admin_loan_once(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::lock_account(account_id, &mut tx).await?;
        if amount > account.admin_loan_balance {
            return Err(WalletError::InsufficientLoanBalance {
                account_id,
                amount,
                outstanding: account.admin_loan_balance,
            });
        }
        let deduction = NewLedgerEntry::new(
            account_id,
            -amount,
            LedgerEntryType::LoanDeduction,
            format!("Administrative loan deduction of {amount}"),
        )
        .with_reference(references::account(account_id));
        let entry = ledger::apply_ledger_entry(deduction, &mut tx).await?;
        let principal = account.admin_loan_balance - amount;
        let account = accounts::set_loan_state(account_id, principal, principal.is_positive(), &mut tx).await?;
        tx.commit().await?;
        info!("🏦️ {amount} deducted from account #{account_id}. Outstanding principal is {principal}");
        Ok(LoanOutcome { account, entry })
    }

    async fn set_loan_status_once(&self, account_id: i64, has_loan: bool) -> Result<LoanOutcome, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::lock_account(account_id, &mut tx).await?;
        let balance = account.loan_balance;
        let (entry, account) = if has_loan {
            let principal = balance.max(Pesewas::default());
            let audit = NewLedgerEntry::new(
                account_id,
                Pesewas::default(),
                LedgerEntryType::LoanStatus,
                format!("Loan activated with a principal of {principal}"),
            )
            .with_reference(references::account(account_id));
            let entry = ledger::apply_ledger_entry(audit, &mut tx).await?;
            (entry, accounts::set_loan_state(account_id, principal, true, &mut tx).await?)
        } else {
            if balance.is_positive() {
                return Err(WalletError::LoanOutstanding { account_id, balance });
            }
            let write_off = NewLedgerEntry::new(
                account_id,
                -balance,
                LedgerEntryType::LoanStatus,
                format!("Loan deactivated. Balance of {balance} reset"),
            )
            .with_reference(references::account(account_id));
            let entry = ledger::apply_ledger_entry(write_off, &mut tx).await?;
            (entry, accounts::set_loan_state(account_id, Pesewas::default(), false, &mut tx).await?)
        };
        tx.commit().await?;
        info!("🏦️ Loan status for account #{account_id} set to {has_loan}");
        Ok(LoanOutcome { account, entry })
    }

    async fn refund_once(
        &self,
        account_id: i64,
        amount: Pesewas,
        reference: String,
    ) -> Result<LedgerEntry, WalletError> {
        let mut tx = self.pool.begin().await?;
        accounts::lock_account(account_id, &mut tx).await?;
        let credit = NewLedgerEntry::new(account_id, amount, LedgerEntryType::Refund, format!("Refund of {amount}"))
            .with_reference(reference);
        let (entry, created) = ledger::apply_unless_exists(credit, &mut tx).await?;
        tx.commit().await?;
        if created {
            info!("🧾️ Refunded {amount} to account #{account_id}");
        }
        Ok(entry)
    }

    async fn process_top_up_once(
        &self,
        top_up: NewTopUp,
        outcome: SettlementOutcome,
    ) -> Result<TopUpResult, WalletError> {
        let mut tx = self.pool.begin().await?;
        let account_id = top_up.account_id;
        accounts::lock_account(account_id, &mut tx).await?;
        let existing = top_ups::fetch_by_gateway_reference(&top_up.gateway_reference, &mut tx).await?;
        if let Some(existing) = &existing {
            if existing.account_id != account_id || existing.amount != top_up.amount {
                return Err(WalletError::TopUpMismatch(top_up.gateway_reference));
            }
        }
        let result = match outcome {
            SettlementOutcome::Success => match existing {
                Some(record) if record.status == TopUpStatus::Approved => {
                    debug!("💳️ Top-up {} was already approved. Nothing to do.", record.gateway_reference);
                    TopUpResult { top_up: record, credit: None }
                },
                Some(record) => {
                    let record = top_ups::update_status(record.id, TopUpStatus::Approved, &mut tx).await?;
                    approve_top_up(record, &mut tx).await?
                },
                None => {
                    let record = top_ups::insert_top_up(top_up, TopUpStatus::Approved, &mut tx).await?;
                    approve_top_up(record, &mut tx).await?
                },
            },
            SettlementOutcome::Pending => {
                let record = match existing {
                    Some(record) => record,
                    None => top_ups::insert_top_up(top_up, TopUpStatus::Pending, &mut tx).await?,
                };
                TopUpResult { top_up: record, credit: None }
            },
            SettlementOutcome::Failed => {
                let record = match existing {
                    Some(record) if record.status == TopUpStatus::Approved => {
                        warn!("💳️ Top-up {} was reported as failed after it was approved", record.gateway_reference);
                        record
                    },
                    Some(record) => top_ups::update_status(record.id, TopUpStatus::Failed, &mut tx).await?,
                    None => top_ups::insert_top_up(top_up, TopUpStatus::Failed, &mut tx).await?,
                };
                TopUpResult { top_up: record, credit: None }
            },
        };
        tx.commit().await?;
        Ok(result)
    }

    async fn ledger_chain_once(&self, account_id: i64) -> Result<LedgerChainReport, WalletError> {
        // A read transaction sees the account row and its entries from the same snapshot.
        let mut tx = self.pool.begin().await?;
        let account =
            accounts::fetch_account(account_id, &mut tx).await?.ok_or(WalletError::AccountNotFound(account_id))?;
        let entries = ledger::entries_for_account(account_id, &mut tx).await?;
        tx.commit().await?;
        Ok(LedgerChainReport::verify(account_id, account.loan_balance, &entries))
    }
}

/// Credits an approved top-up, unless the ledger already holds the credit for it.
async fn approve_top_up(
    record: TopUp,
    conn: &mut SqliteConnection,
) -> Result<TopUpResult, WalletError> {
    let credit = NewLedgerEntry::new(
        record.account_id,
        record.amount,
        LedgerEntryType::TopupApproved,
        format!("Top-up {} approved", record.gateway_reference),
    )
    .with_reference(references::top_up(record.id));
    let (entry, created) = ledger::apply_unless_exists(credit, conn).await?;
    if created {
        info!("💳️ Top-up {} credited {} to account #{}", record.gateway_reference, record.amount, record.account_id);
    }
    Ok(TopUpResult { top_up: record, credit: created.then_some(entry) })
}

/// Credits back what a single cancelled item was charged, once per item. The credit never takes the order's
/// refunds past what its debit charged.
async fn refund_single_item(
    account_id: i64,
    item: &OrderItem,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, WalletError> {
    let reference = references::order_item(item.id);
    if ledger::find_entry_by_reference(account_id, LedgerEntryType::OrderItemRefund, &reference, &mut *conn)
        .await?
        .is_some()
    {
        debug!("🚚️ Order item #{} has already been refunded", item.id);
        return Ok(None);
    }
    let amount = match item.price {
        Some(price) => price,
        None => {
            let product = products::fetch_product(item.product_id, &mut *conn)
                .await?
                .ok_or(WalletError::ProductNotFound(item.product_id))?;
            line_price(product.price, item.quantity)?
        },
    };
    let (charged, already_refunded) = refund_headroom(account_id, item.order_id, &mut *conn).await?;
    let amount = amount.min(charged - already_refunded);
    if !amount.is_positive() {
        debug!("🚚️ Nothing left to refund for order item #{} ({already_refunded} of {charged} already refunded)", item.id);
        return Ok(None);
    }
    let credit = NewLedgerEntry::new(
        account_id,
        amount,
        LedgerEntryType::OrderItemRefund,
        format!("Refund for cancelled order item #{} of order #{}", item.id, item.order_id),
    )
    .with_reference(reference);
    let entry = ledger::apply_ledger_entry(credit, conn).await?;
    Ok(Some(entry))
}

/// Credits back whatever part of the order's debit has not already been refunded item by item, once per order.
async fn refund_order_items(
    account_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, WalletError> {
    let reference = references::order_items_refund(order_id);
    if ledger::find_entry_by_reference(account_id, LedgerEntryType::OrderItemsRefund, &reference, &mut *conn)
        .await?
        .is_some()
    {
        debug!("🚚️ Order #{order_id} has already been refunded");
        return Ok(None);
    }
    let (charged, already_refunded) = refund_headroom(account_id, order_id, &mut *conn).await?;
    let amount = charged - already_refunded;
    if !amount.is_positive() {
        debug!("🚚️ Nothing left to refund for order #{order_id} ({already_refunded} of {charged} already refunded)");
        return Ok(None);
    }
    let credit = NewLedgerEntry::new(
        account_id,
        amount,
        LedgerEntryType::OrderItemsRefund,
        format!("Refund for cancelled order #{order_id}"),
    )
    .with_reference(reference);
    let entry = ledger::apply_ledger_entry(credit, conn).await?;
    Ok(Some(entry))
}

/// What the order's debit charged, and how much of it has already been credited back by item and order refunds.
async fn refund_headroom(
    account_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(Pesewas, Pesewas), WalletError> {
    let items = orders::fetch_order_items(order_id, &mut *conn).await?;
    let charged =
        match ledger::find_entry_by_reference(account_id, LedgerEntryType::Order, &references::order(order_id), &mut *conn)
            .await?
        {
            Some(debit) => debit.amount.abs(),
            None => Pesewas::checked_sum(items.iter().filter_map(|i| i.price))
                .ok_or_else(|| WalletError::validation(format!("Order #{order_id} item prices overflow")))?,
        };
    let item_refs = items.iter().map(|i| references::order_item(i.id)).collect::<Vec<_>>();
    let item_refunds =
        ledger::sum_for_references(account_id, LedgerEntryType::OrderItemRefund, &item_refs, &mut *conn).await?;
    let order_refund = ledger::sum_for_references(
        account_id,
        LedgerEntryType::OrderItemsRefund,
        &[references::order_items_refund(order_id)],
        &mut *conn,
    )
    .await?;
    Ok((charged, item_refunds + order_refund))
}

/// Re-derives the order status from its items and stores it if it changed.
async fn refresh_order_status(order: Order, conn: &mut SqliteConnection) -> Result<Order, WalletError> {
    let items = orders::fetch_order_items(order.id, &mut *conn).await?;
    let status = FulfillmentStatus::aggregate(items.iter().map(|i| i.status));
    if status == order.status {
        return Ok(order);
    }
    trace!("🚚️ Order #{} is now {status}", order.id);
    orders::update_order_status(order.id, status, conn).await
}

fn line_price(unit_price: Pesewas, quantity: i64) -> Result<Pesewas, WalletError> {
    unit_price
        .checked_mul(quantity)
        .ok_or_else(|| WalletError::validation(format!("{quantity} units at {unit_price} is too large to price")))
}

fn require_positive(amount: Pesewas, what: &str) -> Result<(), WalletError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(WalletError::validation(format!("{what} must be positive, got {amount}")))
    }
}

impl AccountManagement for SqliteDatabase {
    async fn create_account(&self, account: NewAccount) -> Result<Account, WalletError> {
        with_retry(&self.retry, "create_account", move || self.insert_account_once(account.clone())).await
    }

    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_account(account_id, &mut conn).await
    }
}

impl ProductCatalog for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, WalletError> {
        with_retry(&self.retry, "insert_product", move || self.insert_product_once(product.clone())).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product(product_id, &mut conn).await
    }

    async fn update_price(&self, product_id: i64, price: Pesewas) -> Result<Product, WalletError> {
        with_retry(&self.retry, "update_price", move || self.update_price_once(product_id, price)).await
    }

    async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, WalletError> {
        with_retry(&self.retry, "set_stock", move || self.set_stock_once(product_id, stock)).await
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn apply_ledger_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, WalletError> {
        with_retry(&self.retry, "apply_ledger_entry", move || self.apply_entry_once(entry.clone())).await
    }

    async fn find_entry_by_reference(
        &self,
        account_id: i64,
        entry_type: LedgerEntryType,
        reference: &str,
    ) -> Result<Option<LedgerEntry>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        ledger::find_entry_by_reference(account_id, entry_type, reference, &mut conn).await
    }
}

impl CartManagement for SqliteDatabase {
    async fn add_item(
        &self,
        account_id: i64,
        product_id: i64,
        quantity: i64,
        dest_number: Option<String>,
    ) -> Result<CartItem, WalletError> {
        if quantity <= 0 {
            return Err(WalletError::validation(format!("Quantity must be positive, got {quantity}")));
        }
        let dest_number = clean_dest_number(dest_number.as_deref())?;
        with_retry(&self.retry, "add_item", move || {
            self.add_item_once(account_id, product_id, quantity, dest_number.clone())
        })
        .await
    }

    async fn fetch_cart(&self, account_id: i64) -> Result<Option<CartContents>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        carts::fetch_cart_contents(account_id, &mut conn).await
    }

    async fn remove_item(&self, cart_item_id: i64) -> Result<bool, WalletError> {
        with_retry(&self.retry, "remove_item", move || self.remove_item_once(cart_item_id)).await
    }

    async fn clear_cart(&self, account_id: i64) -> Result<u64, WalletError> {
        with_retry(&self.retry, "clear_cart", move || self.clear_cart_once(account_id)).await
    }
}

impl SettlementManagement for SqliteDatabase {
    async fn submit_cart(&self, account_id: i64, dest_number: Option<String>) -> Result<OrderWithItems, WalletError> {
        let dest_number = clean_dest_number(dest_number.as_deref())?;
        with_retry(&self.retry, "submit_cart", move || self.submit_cart_once(account_id, dest_number.clone())).await
    }

    async fn create_direct_order(
        &self,
        account_id: i64,
        items: Vec<NewOrderItem>,
        total: Pesewas,
    ) -> Result<OrderWithItems, WalletError> {
        if items.is_empty() {
            return Err(WalletError::validation("A direct order needs at least one item"));
        }
        if total.is_negative() {
            return Err(WalletError::validation(format!("Order total cannot be negative, got {total}")));
        }
        let mut cleaned = Vec::with_capacity(items.len());
        for mut item in items {
            if item.quantity <= 0 {
                return Err(WalletError::validation(format!(
                    "Quantity must be positive, got {} for product #{}",
                    item.quantity, item.product_id
                )));
            }
            if item.price.map(|p| p.is_negative()).unwrap_or(false) {
                return Err(WalletError::validation(format!("Negative price for product #{}", item.product_id)));
            }
            item.dest_number = clean_dest_number(item.dest_number.as_deref())?;
            cleaned.push(item);
        }
        with_retry(&self.retry, "create_direct_order", move || {
            self.create_direct_order_once(account_id, cleaned.clone(), total)
        })
        .await
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderWithItems>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        let Some(order) = orders::fetch_order(order_id, &mut conn).await? else {
            return Ok(None);
        };
        let items = orders::fetch_order_items(order_id, &mut conn).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    async fn orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_account(account_id, &mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }
}

impl FulfillmentManagement for SqliteDatabase {
    async fn set_item_status(&self, item_id: i64, status: FulfillmentStatus) -> Result<StatusChange, WalletError> {
        with_retry(&self.retry, "set_item_status", move || self.set_item_status_once(item_id, status)).await
    }

    async fn set_order_items_status(
        &self,
        order_id: i64,
        status: FulfillmentStatus,
    ) -> Result<StatusChange, WalletError> {
        with_retry(&self.retry, "set_order_items_status", move || self.set_order_items_status_once(order_id, status))
            .await
    }

    async fn set_order_status(&self, order_id: i64, status: FulfillmentStatus) -> Result<Order, WalletError> {
        with_retry(&self.retry, "set_order_status", move || self.set_order_status_once(order_id, status)).await
    }

    async fn complete_processing_items(&self) -> Result<Vec<OrderItem>, WalletError> {
        with_retry(&self.retry, "complete_processing_items", move || self.complete_processing_items_once()).await
    }
}

impl ReconciliationQueries for SqliteDatabase {
    async fn user_transactions(
        &self,
        account_id: i64,
        filter: LedgerQueryFilter,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::user_transactions(account_id, &filter, &mut conn).await
    }

    async fn balance_summary(&self, account_id: i64) -> Result<BalanceSummary, WalletError> {
        let mut conn = self.pool.acquire().await?;
        let account =
            accounts::fetch_account(account_id, &mut conn).await?.ok_or(WalletError::AccountNotFound(account_id))?;
        let totals = reconciliation::totals_by_type(account_id, &mut conn).await?;
        Ok(BalanceSummary::from_totals(
            account_id,
            account.loan_balance,
            account.has_loan,
            account.admin_loan_balance,
            totals,
        ))
    }

    async fn audit_log(&self, filter: AuditLogFilter) -> Result<Page<AuditLogEntry>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::audit_log(&filter, &mut conn).await
    }

    async fn transaction_statistics(&self, filter: AuditLogFilter) -> Result<TransactionStatistics, WalletError> {
        let mut conn = self.pool.acquire().await?;
        reconciliation::statistics(&filter, &mut conn).await
    }

    async fn ledger_chain(&self, account_id: i64) -> Result<LedgerChainReport, WalletError> {
        with_retry(&self.retry, "ledger_chain", move || self.ledger_chain_once(account_id)).await
    }

    async fn order_item_status_counts(&self) -> Result<Vec<StatusCount>, WalletError> {
        let mut conn = self.pool.acquire().await?;
        orders::item_status_counts(&mut conn).await
    }
}

impl LoanManagement for SqliteDatabase {
    async fn assign_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        require_positive(amount, "Loan amount")?;
        with_retry(&self.retry, "assign_loan", move || self.assign_loan_once(account_id, amount)).await
    }

    async fn repay_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        let amount = amount.abs();
        require_positive(amount, "Repayment amount")?;
        with_retry(&self.retry, "repay_loan", move || self.repay_loan_once(account_id, amount)).await
    }

    async fn deduct_admin_loan(&self, account_id: i64, amount: Pesewas) -> Result<LoanOutcome, WalletError> {
        require_positive(amount, "Deduction amount")?;
        with_retry(&self.retry, "deduct_admin_loan", move || self.deduct_admin_loan_once(account_id, amount)).await
    }

    async fn set_loan_status(&self, account_id: i64, has_loan: bool) -> Result<LoanOutcome, WalletError> {
        with_retry(&self.retry, "set_loan_status", move || self.set_loan_status_once(account_id, has_loan)).await
    }

    async fn refund(&self, account_id: i64, amount: Pesewas, reference: &str) -> Result<LedgerEntry, WalletError> {
        require_positive(amount, "Refund amount")?;
        let reference = reference.trim().to_string();
        if reference.is_empty() {
            return Err(WalletError::validation("A refund needs a reference"));
        }
        with_retry(&self.retry, "refund", move || self.refund_once(account_id, amount, reference.clone())).await
    }
}

impl TopUpManagement for SqliteDatabase {
    async fn process_top_up(&self, top_up: NewTopUp, outcome: SettlementOutcome) -> Result<TopUpResult, WalletError> {
        require_positive(top_up.amount, "Top-up amount")?;
        if top_up.gateway_reference.trim().is_empty() {
            return Err(WalletError::validation("A top-up needs a gateway reference"));
        }
        with_retry(&self.retry, "process_top_up", move || self.process_top_up_once(top_up.clone(), outcome)).await
    }
}
