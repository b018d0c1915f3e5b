use chrono::{DateTime, Utc};
use log::*;
use sqlx::{FromRow, SqliteConnection};
use wallet_common::Pesewas;

use crate::{
    db_types::{Cart, CartContents, CartItem, CartLine, Product},
    traits::WalletError,
};

pub async fn fetch_cart(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Cart>, WalletError> {
    let cart = sqlx::query_as("SELECT * FROM carts WHERE account_id = $1").bind(account_id).fetch_optional(conn).await?;
    Ok(cart)
}

/// Returns the account's cart, creating it if this is the first time the account has added anything.
///
/// Two concurrent first additions both land on the same row. A destination number is only recorded on the cart if it
/// does not already have one.
pub async fn fetch_or_create_cart(
    account_id: i64,
    dest_number: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Cart, WalletError> {
    let cart: Cart = sqlx::query_as(
        r#"
    INSERT INTO carts (account_id, dest_number, created_at) VALUES ($1, $2, $3)
    ON CONFLICT (account_id) DO UPDATE SET dest_number = COALESCE(carts.dest_number, excluded.dest_number)
    RETURNING *
    "#,
    )
    .bind(account_id)
    .bind(dest_number)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(cart)
}

pub async fn insert_cart_item(
    cart_id: i64,
    product_id: i64,
    quantity: i64,
    price: Pesewas,
    dest_number: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<CartItem, WalletError> {
    let item: CartItem = sqlx::query_as(
        r#"
    INSERT INTO cart_items (cart_id, product_id, quantity, price, dest_number, created_at)
    VALUES ($1, $2, $3, $4, $5, $6)
    RETURNING *
    "#,
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .bind(price)
    .bind(dest_number)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    debug!("🛒️ Cart #{cart_id}: added {quantity} × product #{product_id} ({price})");
    Ok(item)
}

#[derive(FromRow)]
struct CartLineRow {
    item_id: i64,
    cart_id: i64,
    quantity: i64,
    item_price: Pesewas,
    item_dest_number: Option<String>,
    item_created_at: DateTime<Utc>,
    product_id: i64,
    name: String,
    description: Option<String>,
    price: Pesewas,
    stock: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        let item = CartItem {
            id: row.item_id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price: row.item_price,
            dest_number: row.item_dest_number,
            created_at: row.item_created_at,
        };
        let product = Product {
            id: row.product_id,
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        CartLine { item, product }
    }
}

/// The cart's items joined with the current catalog rows for their products, in the order they were added.
pub async fn fetch_cart_lines(cart_id: i64, conn: &mut SqliteConnection) -> Result<Vec<CartLine>, WalletError> {
    let rows: Vec<CartLineRow> = sqlx::query_as(
        r#"
    SELECT
        cart_items.id AS item_id,
        cart_items.cart_id,
        cart_items.quantity,
        cart_items.price AS item_price,
        cart_items.dest_number AS item_dest_number,
        cart_items.created_at AS item_created_at,
        products.id AS product_id,
        products.name,
        products.description,
        products.price,
        products.stock,
        products.created_at,
        products.updated_at
    FROM cart_items JOIN products ON cart_items.product_id = products.id
    WHERE cart_items.cart_id = $1
    ORDER BY cart_items.id ASC
    "#,
    )
    .bind(cart_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(CartLine::from).collect())
}

pub async fn fetch_cart_contents(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CartContents>, WalletError> {
    let Some(cart) = fetch_cart(account_id, &mut *conn).await? else {
        return Ok(None);
    };
    let lines = fetch_cart_lines(cart.id, conn).await?;
    Ok(Some(CartContents { cart, lines }))
}

/// Deletes a single cart item. Returns the number of rows removed, which is zero if it was already gone.
pub async fn delete_cart_item(cart_item_id: i64, conn: &mut SqliteConnection) -> Result<u64, WalletError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1").bind(cart_item_id).execute(conn).await?;
    Ok(result.rows_affected())
}

pub async fn clear_cart_items(cart_id: i64, conn: &mut SqliteConnection) -> Result<u64, WalletError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1").bind(cart_id).execute(conn).await?;
    let removed = result.rows_affected();
    trace!("🛒️ Removed {removed} items from cart #{cart_id}");
    Ok(removed)
}
