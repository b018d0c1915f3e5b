use wallet_common::Pesewas;

use crate::{
    db_types::{Account, NewAccount, NewProduct, Product},
    traits::WalletError,
};

#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn create_account(&self, account: NewAccount) -> Result<Account, WalletError>;

    /// Fetches the account with the given id. If no account exists, `None` is returned.
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, WalletError>;
}

/// The product catalog. Settlement reads prices and stock levels from here; it never changes stock.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, WalletError>;

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, WalletError>;

    /// Sets the unit price. Carts already holding the product keep their snapshot price for display, but will settle
    /// at the new price.
    async fn update_price(&self, product_id: i64, price: Pesewas) -> Result<Product, WalletError>;

    async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, WalletError>;
}
