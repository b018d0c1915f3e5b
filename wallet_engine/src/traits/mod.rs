//! # Storage contracts
//!
//! This module defines the behaviour that a storage backend must expose in order to run the wallet engine. Each trait
//! covers one concern, so that callers (and their tests) only depend on what they use.
//!
//! ## Units of work
//! Every method that changes money runs as one atomic unit of work in the backend: either all of its writes land, or
//! none do. Backends retry units of work that fail on lock contention, and never retry business-rule failures.
//!
//! ## Traits
//! * [`AccountManagement`] creates and fetches accounts.
//! * [`ProductCatalog`] is the read/write interface to the product catalog.
//! * [`LedgerManagement`] exposes the balance mutator, the only way a balance changes.
//! * [`CartManagement`] builds up an account's cart.
//! * [`SettlementManagement`] turns carts (or externally supplied item lists) into paid orders.
//! * [`FulfillmentManagement`] moves order items through their lifecycle and compensates cancellations.
//! * [`ReconciliationQueries`] answers read-only reporting questions about the ledger.
//! * [`LoanManagement`] handles administrative credit lines and manual refunds.
//! * [`TopUpManagement`] credits accounts for payments confirmed by the payment gateway.
mod account_management;
mod errors;
mod ledger_management;
mod order_management;
mod reconciliation;

pub use account_management::{AccountManagement, ProductCatalog};
pub use errors::{is_transient_sqlx_error, ErrorKind, WalletError};
pub use ledger_management::{LedgerManagement, LoanManagement, TopUpManagement};
pub use order_management::{CartManagement, FulfillmentManagement, SettlementManagement};
pub use reconciliation::ReconciliationQueries;
