//! # Wallet engine public API
//!
//! The `wallet_api` module exposes the programmatic API of the wallet engine. The API is modular, so that clients can
//! pick the functionality they need, and each part only requires the storage traits it actually uses.
//!
//! * [`accounts_api`] creates and fetches accounts and catalog products.
//! * [`cart_api`] builds up an account's cart.
//! * [`order_flow_api`] settles carts and direct orders, and drives order items through fulfillment. Settlement and
//!   refund events are published from here.
//! * [`ledger_api`] is the administrative face of the ledger: manual entries, loans, refunds and gateway top-ups.
//! * [`reconciliation_api`] answers reporting queries, with a short-lived cache in front of the store.
//!
//! # API usage
//!
//! An API instance is created by supplying a storage backend that implements the traits the API needs:
//!
//! ```rust,ignore
//! use wallet_engine::{CartApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/wallet.db", 25).await?;
//! let api = CartApi::new(db);
//! let item = api.add_item(account_id, product_id, 2, Some("0244123456".into())).await?;
//! ```
pub mod accounts_api;
pub mod cart_api;
pub mod ledger_api;
pub mod ledger_objects;
pub mod order_flow_api;
pub mod order_objects;
pub mod reconciliation_api;

pub use ledger_objects::{
    AmountSign,
    AuditLogEntry,
    AuditLogFilter,
    BalanceSummary,
    ChainBreak,
    LedgerChainReport,
    LedgerQueryFilter,
    LoanOutcome,
    Page,
    PageInfo,
    StatusCount,
    TopUpResult,
    TransactionStatistics,
    TypeTotal,
};
