use chrono::Utc;
use log::*;
use sqlx::SqliteConnection;
use wallet_common::Pesewas;

use crate::{
    db_types::{NewProduct, Product},
    traits::WalletError,
};

pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, WalletError> {
    if product.name.trim().is_empty() {
        return Err(WalletError::validation("Product name cannot be empty"));
    }
    if product.price.is_negative() {
        return Err(WalletError::validation(format!("Product price cannot be negative ({})", product.price)));
    }
    if product.stock < 0 {
        return Err(WalletError::validation(format!("Product stock cannot be negative ({})", product.stock)));
    }
    let now = Utc::now();
    let product: Product = sqlx::query_as(
        r#"
    INSERT INTO products (name, description, price, stock, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $5)
    RETURNING *
    "#,
    )
    .bind(product.name.trim())
    .bind(product.description)
    .bind(product.price)
    .bind(product.stock)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("🛒️ Product #{} ({}) added at {}", product.id, product.name, product.price);
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, WalletError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn update_price(
    product_id: i64,
    price: Pesewas,
    conn: &mut SqliteConnection,
) -> Result<Product, WalletError> {
    if price.is_negative() {
        return Err(WalletError::validation(format!("Product price cannot be negative ({price})")));
    }
    let product: Option<Product> =
        sqlx::query_as("UPDATE products SET price = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(price)
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    product.ok_or(WalletError::ProductNotFound(product_id))
}

pub async fn set_stock(product_id: i64, stock: i64, conn: &mut SqliteConnection) -> Result<Product, WalletError> {
    if stock < 0 {
        return Err(WalletError::validation(format!("Product stock cannot be negative ({stock})")));
    }
    let product: Option<Product> =
        sqlx::query_as("UPDATE products SET stock = $1, updated_at = $2 WHERE id = $3 RETURNING *")
            .bind(stock)
            .bind(Utc::now())
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    product.ok_or(WalletError::ProductNotFound(product_id))
}
