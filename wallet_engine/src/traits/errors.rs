use std::time::Duration;

use thiserror::Error;
use wallet_common::Pesewas;

use crate::db_types::FulfillmentStatus;

/// Coarse classification of a [`WalletError`]. Outer surfaces map this onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape: non-positive quantities, unknown statuses, empty carts.
    Validation,
    NotFound,
    /// The request is well-formed but the current state forbids it.
    Conflict,
    /// Lock contention in the store. Retried internally and never surfaced as its own kind to callers.
    Transient,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("Invalid input. {0}")]
    ValidationError(String),
    #[error("{0}")]
    InvalidStatus(String),
    #[error("Account #{0} does not exist")]
    AccountNotFound(i64),
    #[error("Product #{0} does not exist")]
    ProductNotFound(i64),
    #[error("Product #{0} is out of stock")]
    ProductOutOfStock(i64),
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
    #[error("Order item #{0} does not exist")]
    OrderItemNotFound(i64),
    #[error("The cart for account #{0} is empty")]
    EmptyCart(i64),
    #[error("Insufficient balance. Account #{account_id} has {balance} available, but {required} is required")]
    InsufficientBalance { account_id: i64, balance: Pesewas, required: Pesewas },
    #[error("Order item #{item_id} cannot move from {from} to {to}")]
    IllegalStatusTransition { item_id: i64, from: FulfillmentStatus, to: FulfillmentStatus },
    #[error("Account #{account_id} still has an outstanding balance of {balance}")]
    LoanOutstanding { account_id: i64, balance: Pesewas },
    #[error("Cannot deduct {amount} from account #{account_id}. Only {outstanding} of loan principal is outstanding")]
    InsufficientLoanBalance { account_id: i64, amount: Pesewas, outstanding: Pesewas },
    #[error("Top-up {0} was already recorded with different details")]
    TopUpMismatch(String),
    #[error("The store is busy. {0}")]
    TransientStoreError(String),
    #[error("The store did not complete the operation within {0:?}")]
    StoreTimeout(Duration),
    #[error("The store is unavailable after {attempts} attempts. {reason}")]
    StoreUnavailable { attempts: u32, reason: String },
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) | Self::InvalidStatus(_) | Self::ProductOutOfStock(_) | Self::EmptyCart(_) => {
                ErrorKind::Validation
            },
            Self::AccountNotFound(_) | Self::ProductNotFound(_) | Self::OrderNotFound(_) | Self::OrderItemNotFound(_) => {
                ErrorKind::NotFound
            },
            Self::InsufficientBalance { .. } |
            Self::IllegalStatusTransition { .. } |
            Self::LoanOutstanding { .. } |
            Self::InsufficientLoanBalance { .. } |
            Self::TopUpMismatch(_) => ErrorKind::Conflict,
            Self::TransientStoreError(_) => ErrorKind::Transient,
            Self::StoreTimeout(_) | Self::StoreUnavailable { .. } | Self::DatabaseError(_) => ErrorKind::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// True for errors caused by lock contention rather than by the statement itself.
///
/// SQLite reports extended result codes (e.g. 517, `SQLITE_BUSY_SNAPSHOT`), whose low byte is the primary code.
pub fn is_transient_sqlx_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
            .unwrap_or(false),
        _ => false,
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        if is_transient_sqlx_error(&e) {
            Self::TransientStoreError(e.to_string())
        } else {
            Self::DatabaseError(e.to_string())
        }
    }
}
