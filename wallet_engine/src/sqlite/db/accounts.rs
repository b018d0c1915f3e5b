use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;
use wallet_common::Pesewas;

use crate::{
    db_types::{Account, NewAccount},
    traits::WalletError,
};

pub async fn insert_account(account: NewAccount, conn: &mut SqliteConnection) -> Result<Account, WalletError> {
    let name = account.name.trim();
    if name.is_empty() {
        return Err(WalletError::validation("Account name cannot be empty"));
    }
    let now = Utc::now();
    let account: Account = sqlx::query_as(
        r#"
    INSERT INTO accounts (name, loan_balance, has_loan, admin_loan_balance, created_at, updated_at)
    VALUES ($1, 0, 0, 0, $2, $2)
    RETURNING *
    "#,
    )
    .bind(name)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🧾️ Account #{} created for {}", account.id, account.name);
    Ok(account)
}

pub async fn fetch_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, WalletError> {
    let account = sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(account_id).fetch_optional(conn).await?;
    Ok(account)
}

/// Fetches the account and claims the database write lock in the same statement.
///
/// Units of work that read before they write should call this first, so that the rows they read cannot change
/// underneath them before they commit.
pub async fn lock_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Account, WalletError> {
    let account: Option<Account> =
        sqlx::query_as("UPDATE accounts SET updated_at = $1 WHERE id = $2 RETURNING *")
            .bind(Utc::now())
            .bind(account_id)
            .fetch_optional(conn)
            .await?;
    account.ok_or(WalletError::AccountNotFound(account_id))
}

/// Atomically adds `amount` to the stored balance and returns the new balance, or `None` if there is no such account.
///
/// The increment happens inside a single statement, so concurrent callers never overwrite each other.
pub(crate) async fn increment_balance(
    account_id: i64,
    amount: Pesewas,
    conn: &mut SqliteConnection,
) -> Result<Option<Pesewas>, WalletError> {
    let balance = sqlx::query_scalar(
        "UPDATE accounts SET loan_balance = loan_balance + $1, updated_at = $2 WHERE id = $3 RETURNING loan_balance",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    Ok(balance)
}

/// Overwrites the loan bookkeeping fields. The spendable balance is untouched.
pub async fn set_loan_state(
    account_id: i64,
    admin_loan_balance: Pesewas,
    has_loan: bool,
    conn: &mut SqliteConnection,
) -> Result<Account, WalletError> {
    let account: Option<Account> = sqlx::query_as(
        "UPDATE accounts SET admin_loan_balance = $1, has_loan = $2, updated_at = $3 WHERE id = $4 RETURNING *",
    )
    .bind(admin_loan_balance)
    .bind(has_loan)
    .bind(Utc::now())
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    trace!("🏦️ Loan state for account #{account_id} set to {admin_loan_balance} (has_loan: {has_loan})");
    account.ok_or(WalletError::AccountNotFound(account_id))
}
