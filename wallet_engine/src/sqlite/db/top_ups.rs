use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewTopUp, TopUp, TopUpStatus},
    traits::WalletError,
};

pub async fn fetch_by_gateway_reference(
    gateway_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<TopUp>, WalletError> {
    let top_up = sqlx::query_as("SELECT * FROM top_ups WHERE gateway_reference = $1")
        .bind(gateway_reference)
        .fetch_optional(conn)
        .await?;
    Ok(top_up)
}

pub async fn insert_top_up(
    top_up: NewTopUp,
    status: TopUpStatus,
    conn: &mut SqliteConnection,
) -> Result<TopUp, WalletError> {
    let now = Utc::now();
    let top_up: TopUp = sqlx::query_as(
        r#"
    INSERT INTO top_ups (account_id, amount, gateway_reference, status, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $5)
    RETURNING *
    "#,
    )
    .bind(top_up.account_id)
    .bind(top_up.amount)
    .bind(top_up.gateway_reference)
    .bind(status)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("💳️ Top-up #{} ({}) recorded for account #{} as {status}", top_up.id, top_up.amount, top_up.account_id);
    Ok(top_up)
}

pub async fn update_status(
    top_up_id: i64,
    status: TopUpStatus,
    conn: &mut SqliteConnection,
) -> Result<TopUp, WalletError> {
    let top_up: TopUp = sqlx::query_as("UPDATE top_ups SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(Utc::now())
        .bind(top_up_id)
        .fetch_one(conn)
        .await?;
    trace!("💳️ Top-up #{top_up_id} is now {status}");
    Ok(top_up)
}
