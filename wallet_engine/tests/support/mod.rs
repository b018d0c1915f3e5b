#![allow(dead_code)]
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use wallet_common::Pesewas;
use wallet_engine::{
    db_types::{Account, LedgerEntryType, NewAccount, NewLedgerEntry, NewProduct, Product},
    test_utils::prepare_env::fresh_database,
    AccountManagement,
    LedgerManagement,
    ProductCatalog,
    SqliteDatabase,
};

pub async fn setup() -> SqliteDatabase {
    fresh_database().await
}

pub async fn tear_down(mut db: SqliteDatabase) {
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    if let Err(e) = Sqlite::drop_database(db.url()).await {
        warn!("🚀️ Failed to remove database {}: {e}", db.url());
    }
}

/// Creates an account and seeds it with `cedis` through a top-up credit.
pub async fn funded_account(db: &SqliteDatabase, name: &str, cedis: i64) -> Account {
    let account = db.create_account(NewAccount::new(name)).await.expect("Error creating account");
    if cedis != 0 {
        let seed = NewLedgerEntry::new(
            account.id,
            Pesewas::from_cedis(cedis),
            LedgerEntryType::TopupApproved,
            "Opening balance",
        );
        db.apply_ledger_entry(seed).await.expect("Error seeding balance");
    }
    db.fetch_account(account.id).await.expect("Error fetching account").expect("Account missing")
}

pub async fn product(db: &SqliteDatabase, name: &str, cedis: i64) -> Product {
    db.insert_product(NewProduct::new(name, Pesewas::from_cedis(cedis), 100)).await.expect("Error adding product")
}

pub async fn balance_of(db: &SqliteDatabase, account_id: i64) -> Pesewas {
    db.fetch_account(account_id).await.expect("Error fetching account").expect("Account missing").loan_balance
}
