//! Read-only aggregation queries over the ledger. Nothing here takes a lock or gates a write.
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::LedgerEntry,
    traits::WalletError,
    wallet_api::{
        AmountSign,
        AuditLogEntry,
        AuditLogFilter,
        LedgerQueryFilter,
        Page,
        PageInfo,
        TransactionStatistics,
        TypeTotal,
    },
};

/// An account's ledger entries, newest first.
pub async fn user_transactions(
    account_id: i64,
    filter: &LedgerQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, WalletError> {
    let mut builder = QueryBuilder::new("SELECT * FROM ledger_entries WHERE account_id = ");
    builder.push_bind(account_id);
    if let Some(since) = filter.since {
        builder.push(" AND created_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND created_at <= ");
        builder.push_bind(until);
    }
    if let Some(entry_type) = filter.entry_type {
        builder.push(" AND entry_type = ");
        builder.push_bind(entry_type);
    }
    builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    builder.push_bind(filter.effective_limit());
    let entries = builder.build_query_as::<LedgerEntry>().fetch_all(conn).await?;
    trace!("📊️ {} transactions fetched for account #{account_id}", entries.len());
    Ok(entries)
}

pub async fn totals_by_type(account_id: i64, conn: &mut SqliteConnection) -> Result<Vec<TypeTotal>, WalletError> {
    let totals = sqlx::query_as(
        r#"
    SELECT entry_type, COALESCE(SUM(amount), 0) AS total, COUNT(*) AS count
    FROM ledger_entries
    WHERE account_id = $1
    GROUP BY entry_type
    ORDER BY entry_type
    "#,
    )
    .bind(account_id)
    .fetch_all(conn)
    .await?;
    Ok(totals)
}

fn push_audit_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &AuditLogFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(account_id) = filter.account_id {
        builder.push(" AND ledger_entries.account_id = ");
        builder.push_bind(account_id);
    }
    if let Some(since) = filter.since {
        builder.push(" AND ledger_entries.created_at >= ");
        builder.push_bind(since);
    }
    if let Some(until) = filter.until {
        builder.push(" AND ledger_entries.created_at <= ");
        builder.push_bind(until);
    }
    if let Some(entry_type) = filter.entry_type {
        builder.push(" AND ledger_entries.entry_type = ");
        builder.push_bind(entry_type);
    }
    match filter.sign {
        Some(AmountSign::Positive) => {
            builder.push(" AND ledger_entries.amount >= 0");
        },
        Some(AmountSign::Negative) => {
            builder.push(" AND ledger_entries.amount < 0");
        },
        None => {},
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND accounts.name LIKE ");
        builder.push_bind(format!("%{search}%"));
    }
}

/// A page of the cross-account audit log, newest first, with the total number of matching rows.
pub async fn audit_log(
    filter: &AuditLogFilter,
    conn: &mut SqliteConnection,
) -> Result<Page<AuditLogEntry>, WalletError> {
    let mut count_query = QueryBuilder::new(
        "SELECT COUNT(*) FROM ledger_entries JOIN accounts ON ledger_entries.account_id = accounts.id",
    );
    push_audit_filters(&mut count_query, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut builder = QueryBuilder::new(
        "SELECT ledger_entries.*, accounts.name AS account_name FROM ledger_entries JOIN accounts ON \
         ledger_entries.account_id = accounts.id",
    );
    push_audit_filters(&mut builder, filter);
    builder.push(" ORDER BY ledger_entries.created_at DESC, ledger_entries.id DESC LIMIT ");
    builder.push_bind(filter.limit());
    builder.push(" OFFSET ");
    builder.push_bind(filter.offset());
    trace!("📊️ Executing query: {}", builder.sql());
    let items = builder.build_query_as::<AuditLogEntry>().fetch_all(conn).await?;
    Ok(Page { items, pagination: PageInfo::new(filter.page(), filter.limit(), total) })
}

/// Count, credits, debits and net over every ledger row matching the filter. Paging is ignored.
pub async fn statistics(
    filter: &AuditLogFilter,
    conn: &mut SqliteConnection,
) -> Result<TransactionStatistics, WalletError> {
    let mut builder = QueryBuilder::new(
        r#"SELECT
        COUNT(*) AS total_transactions,
        COALESCE(SUM(CASE WHEN ledger_entries.amount >= 0 THEN ledger_entries.amount ELSE 0 END), 0) AS total_credits,
        COALESCE(SUM(CASE WHEN ledger_entries.amount < 0 THEN ledger_entries.amount ELSE 0 END), 0) AS total_debits,
        COALESCE(SUM(ledger_entries.amount), 0) AS net
    FROM ledger_entries JOIN accounts ON ledger_entries.account_id = accounts.id"#,
    );
    push_audit_filters(&mut builder, filter);
    let stats = builder.build_query_as::<TransactionStatistics>().fetch_one(conn).await?;
    Ok(stats)
}
