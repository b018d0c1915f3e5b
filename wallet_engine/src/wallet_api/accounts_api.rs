//! Accounts and the product catalog.
use std::fmt::Debug;

use log::*;
use wallet_common::Pesewas;

use crate::{
    db_types::{Account, NewAccount, NewProduct, Product},
    traits::{AccountManagement, ProductCatalog, WalletError},
};

/// The `AccountApi` creates and fetches wallet accounts.
pub struct AccountApi<B> {
    db: B,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create_account(&self, account: NewAccount) -> Result<Account, WalletError> {
        let account = self.db.create_account(account).await?;
        info!("🧾️ Account #{} opened for {}", account.id, account.name);
        Ok(account)
    }

    /// Fetches the account for the given id. If no account exists, `None` is returned.
    pub async fn account_by_id(&self, account_id: i64) -> Result<Option<Account>, WalletError> {
        self.db.fetch_account(account_id).await
    }
}

pub struct CatalogApi<B> {
    db: B,
}

impl<B> Debug for CatalogApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CatalogApi")
    }
}

impl<B> CatalogApi<B>
where B: ProductCatalog
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn add_product(&self, product: NewProduct) -> Result<Product, WalletError> {
        self.db.insert_product(product).await
    }

    pub async fn product_by_id(&self, product_id: i64) -> Result<Option<Product>, WalletError> {
        self.db.fetch_product(product_id).await
    }

    pub async fn update_price(&self, product_id: i64, price: Pesewas) -> Result<Product, WalletError> {
        let product = self.db.update_price(product_id, price).await?;
        debug!("🛒️ Product #{product_id} now costs {price}");
        Ok(product)
    }

    pub async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, WalletError> {
        self.db.set_stock(product_id, stock).await
    }
}
