//! Wallet Engine
//!
//! The wallet engine keeps a prepaid balance for every account, turns shopping carts into paid orders, and tracks
//! those orders through fulfillment, issuing refunds when items are cancelled.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`SqliteDatabase`]). Every balance change happens inside a single store transaction together with the
//!    ledger entry that records it. You should never need to touch the store directly; the exception is the data
//!    types in [`mod@db_types`], which are public.
//! 2. The traits in [`mod@traits`]. A backend implements these to act as storage for the engine.
//! 3. The public API ([`mod@wallet_api`]). This is what outer surfaces, such as the HTTP server, talk to.
//!
//! The engine also emits events when orders settle and when refunds are issued. A simple actor framework in
//! [`mod@events`] lets you hook into these and perform custom actions.
pub mod cache;
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;
pub mod wallet_api;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AccountManagement,
    CartManagement,
    ErrorKind,
    FulfillmentManagement,
    LedgerManagement,
    LoanManagement,
    ProductCatalog,
    ReconciliationQueries,
    SettlementManagement,
    TopUpManagement,
    WalletError,
};
pub use wallet_api::{
    accounts_api::{AccountApi, CatalogApi},
    cart_api::{BulkAddResult, CartApi},
    ledger_api::{LedgerApi, TopUpApi},
    order_flow_api::OrderFlowApi,
    order_objects,
    reconciliation_api::{ReconciliationApi, ReconciliationCache},
};
