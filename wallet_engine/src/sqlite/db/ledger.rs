//! The ledger store and the balance mutator.
//!
//! [`apply_ledger_entry`] is the only code path that changes an account balance or writes a ledger row.
use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};
use wallet_common::Pesewas;

use super::accounts;
use crate::{
    db_types::{LedgerEntry, LedgerEntryType, NewLedgerEntry},
    traits::WalletError,
};

/// Applies a signed amount to an account and appends the matching ledger entry.
///
/// The balance is incremented in place and the previous balance is derived from the value the increment returned, so
/// the entry always describes exactly the change that was made. Both writes land in `conn`, which should be a
/// transaction: they commit or roll back together with whatever else the caller does in it. Zero amounts are allowed
/// and produce audit-only entries.
pub async fn apply_ledger_entry(
    entry: NewLedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, WalletError> {
    let NewLedgerEntry { account_id, amount, entry_type, description, reference } = entry;
    let balance = accounts::increment_balance(account_id, amount, &mut *conn)
        .await?
        .ok_or(WalletError::AccountNotFound(account_id))?;
    let previous_balance = balance - amount;
    let entry: LedgerEntry = sqlx::query_as(
        r#"
    INSERT INTO ledger_entries (account_id, amount, balance, previous_balance, entry_type, description, reference,
        created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING *
    "#,
    )
    .bind(account_id)
    .bind(amount)
    .bind(balance)
    .bind(previous_balance)
    .bind(entry_type)
    .bind(description)
    .bind(reference)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!(
        "🧾️ [{}] {} applied to account #{account_id}: {previous_balance} -> {balance} ({})",
        entry.entry_type,
        entry.amount,
        entry.reference.as_deref().unwrap_or("no reference")
    );
    Ok(entry)
}

/// Looks for an entry with the given type and reference. This is the idempotency check for compensating entries and
/// must run in the same transaction as the write it guards.
pub async fn find_entry_by_reference(
    account_id: i64,
    entry_type: LedgerEntryType,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEntry>, WalletError> {
    let entry = sqlx::query_as(
        r#"
    SELECT * FROM ledger_entries
    WHERE account_id = $1 AND entry_type = $2 AND reference = $3
    ORDER BY id ASC LIMIT 1
    "#,
    )
    .bind(account_id)
    .bind(entry_type)
    .bind(reference)
    .fetch_optional(conn)
    .await?;
    Ok(entry)
}

/// Applies `entry` unless an entry with the same account, type and reference already exists.
///
/// Returns the entry and whether this call wrote it. Entries without a reference are always applied.
pub async fn apply_unless_exists(
    entry: NewLedgerEntry,
    conn: &mut SqliteConnection,
) -> Result<(LedgerEntry, bool), WalletError> {
    if let Some(reference) = entry.reference.as_deref() {
        let existing = find_entry_by_reference(entry.account_id, entry.entry_type, reference, &mut *conn).await?;
        if let Some(existing) = existing {
            trace!("🧾️ [{}] {reference} already recorded as entry #{}", existing.entry_type, existing.id);
            return Ok((existing, false));
        }
    }
    let entry = apply_ledger_entry(entry, conn).await?;
    Ok((entry, true))
}

/// Sums the amounts of all entries of `entry_type` whose reference is one of `references`.
pub async fn sum_for_references(
    account_id: i64,
    entry_type: LedgerEntryType,
    references: &[String],
    conn: &mut SqliteConnection,
) -> Result<Pesewas, WalletError> {
    if references.is_empty() {
        return Ok(Pesewas::default());
    }
    let mut builder = QueryBuilder::new("SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = ");
    builder.push_bind(account_id);
    builder.push(" AND entry_type = ");
    builder.push_bind(entry_type);
    builder.push(" AND reference IN (");
    let mut refs = builder.separated(", ");
    for reference in references {
        refs.push_bind(reference);
    }
    refs.push_unseparated(")");
    let total: Pesewas = builder.build_query_scalar().fetch_one(conn).await?;
    Ok(total)
}

/// Every entry for the account, oldest first. Ids are assigned under the write lock, so id order is commit order.
pub async fn entries_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, WalletError> {
    let entries = sqlx::query_as("SELECT * FROM ledger_entries WHERE account_id = $1 ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}
