use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, SqliteConnection};
use wallet_common::Pesewas;

use crate::{
    db_types::{FulfillmentStatus, NewOrder, Order, OrderItem},
    helpers::dest_number_variants,
    traits::WalletError,
    wallet_api::{order_objects::OrderQueryFilter, StatusCount},
};

pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, WalletError> {
    let now = Utc::now();
    let order: Order = sqlx::query_as(
        r#"
    INSERT INTO orders (account_id, dest_number, status, total_price, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $5)
    RETURNING *
    "#,
    )
    .bind(order.account_id)
    .bind(order.dest_number)
    .bind(FulfillmentStatus::Pending)
    .bind(order.total_price)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("📦️ Order #{} created for account #{} ({})", order.id, order.account_id, order.total_price);
    Ok(order)
}

pub async fn insert_order_item(
    order_id: i64,
    product_id: i64,
    quantity: i64,
    dest_number: Option<&str>,
    price: Option<Pesewas>,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, WalletError> {
    let now = Utc::now();
    let item: OrderItem = sqlx::query_as(
        r#"
    INSERT INTO order_items (order_id, product_id, quantity, dest_number, status, price, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
    RETURNING *
    "#,
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(dest_number)
    .bind(FulfillmentStatus::Pending)
    .bind(price)
    .bind(now)
    .fetch_one(conn)
    .await?;
    trace!("📦️ Order #{order_id}: item #{} for {quantity} × product #{product_id}", item.id);
    Ok(item)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, WalletError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, WalletError> {
    let items = sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

/// Fetches the order and claims the database write lock, so that its items cannot change until the caller commits.
pub async fn lock_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Order, WalletError> {
    let order: Option<Order> = sqlx::query_as("UPDATE orders SET updated_at = $1 WHERE id = $2 RETURNING *")
        .bind(Utc::now())
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    order.ok_or(WalletError::OrderNotFound(order_id))
}

/// Fetches the order item and claims the database write lock.
pub async fn lock_order_item(item_id: i64, conn: &mut SqliteConnection) -> Result<OrderItem, WalletError> {
    let item: Option<OrderItem> = sqlx::query_as("UPDATE order_items SET updated_at = $1 WHERE id = $2 RETURNING *")
        .bind(Utc::now())
        .bind(item_id)
        .fetch_optional(conn)
        .await?;
    item.ok_or(WalletError::OrderItemNotFound(item_id))
}

/// Sets the status of every item in `item_ids`. Returns the updated rows.
pub async fn update_item_status(
    item_ids: &[i64],
    status: FulfillmentStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, WalletError> {
    if item_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new("UPDATE order_items SET status = ");
    builder.push_bind(status);
    builder.push(", updated_at = ");
    builder.push_bind(Utc::now());
    builder.push(" WHERE id IN (");
    let mut ids = builder.separated(", ");
    for id in item_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(") RETURNING *");
    let items = builder.build_query_as::<OrderItem>().fetch_all(conn).await?;
    trace!("🚚️ {} order items set to {status}", items.len());
    Ok(items)
}

pub async fn update_order_status(
    order_id: i64,
    status: FulfillmentStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, WalletError> {
    let order: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(status)
            .bind(Utc::now())
            .bind(order_id)
            .fetch_optional(conn)
            .await?;
    order.ok_or(WalletError::OrderNotFound(order_id))
}

pub async fn fetch_orders_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, WalletError> {
    let orders = sqlx::query_as("SELECT * FROM orders WHERE account_id = $1 ORDER BY id DESC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}

/// Moves every `Processing` item to `Completed` in one statement and returns the items that moved.
pub async fn complete_processing_items(conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, WalletError> {
    let items: Vec<OrderItem> =
        sqlx::query_as("UPDATE order_items SET status = $1, updated_at = $2 WHERE status = $3 RETURNING *")
            .bind(FulfillmentStatus::Completed)
            .bind(Utc::now())
            .bind(FulfillmentStatus::Processing)
            .fetch_all(conn)
            .await?;
    debug!("🚚️ {} processing items marked as completed", items.len());
    Ok(items)
}

pub async fn item_status_counts(conn: &mut SqliteConnection) -> Result<Vec<StatusCount>, WalletError> {
    let counts = sqlx::query_as("SELECT status, COUNT(*) AS count FROM order_items GROUP BY status ORDER BY status")
        .fetch_all(conn)
        .await?;
    Ok(counts)
}

/// Searches for orders matching all the given criteria, newest first.
///
/// A destination number matches if the order, or any of its items, was recorded under any of the number's local
/// spellings.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, WalletError> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(account_id) = query.account_id {
        where_clause.push("account_id = ");
        where_clause.push_bind_unseparated(account_id);
    }
    if let Some(dest_number) = query.dest_number.as_deref() {
        let variants = dest_number_variants(dest_number);
        where_clause.push("(dest_number IN (");
        for (i, v) in variants.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(v.clone());
        }
        where_clause.push_unseparated(
            ") OR EXISTS (SELECT 1 FROM order_items WHERE order_items.order_id = orders.id AND order_items.dest_number \
             IN (",
        );
        for (i, v) in variants.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(v);
        }
        where_clause.push_unseparated(")))");
    }
    if let Some(statuses) = query.status.filter(|s| !s.is_empty()) {
        where_clause.push("status IN (");
        for (i, s) in statuses.into_iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(s);
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at DESC, id DESC");

    trace!("📦️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📦️ Result of search_orders: {}", orders.len());
    Ok(orders)
}
