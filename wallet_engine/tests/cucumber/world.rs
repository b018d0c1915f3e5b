use std::collections::HashMap;

use cucumber::World;
use log::*;
use wallet_engine::{
    db_types::{Account, OrderWithItems, Product},
    events::EventProducers,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations},
    CartApi,
    LedgerApi,
    OrderFlowApi,
    SqliteDatabase,
    TopUpApi,
    WalletError,
};

#[derive(Default, Debug, World)]
pub struct WalletWorld {
    pub system: Option<WalletSystem>,
}

#[derive(Debug)]
pub struct WalletSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub carts: CartApi<SqliteDatabase>,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub top_ups: TopUpApi<SqliteDatabase>,
    pub accounts: HashMap<String, Account>,
    pub products: HashMap<String, Product>,
    pub last_order: Option<OrderWithItems>,
    pub last_error: Option<WalletError>,
}

impl WalletWorld {
    pub fn system(&self) -> &WalletSystem {
        self.system.as_ref().expect("Wallet system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut WalletSystem {
        self.system.as_mut().expect("Wallet system not initialised")
    }

    pub fn account(&self, name: &str) -> &Account {
        self.system().accounts.get(name).unwrap_or_else(|| panic!("No account named {name}"))
    }

    pub fn product(&self, name: &str) -> &Product {
        self.system().products.get(name).unwrap_or_else(|| panic!("No product named {name}"))
    }

    pub fn last_order(&self) -> &OrderWithItems {
        self.system().last_order.as_ref().expect("No order has been placed")
    }

    /// Keeps the error for a later `Then` step instead of failing the `When` step.
    pub fn record<T>(&mut self, result: Result<T, WalletError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.system_mut().last_error = None;
                Some(v)
            },
            Err(e) => {
                debug!("🥒️ Operation failed: {e}");
                self.system_mut().last_error = Some(e);
                None
            },
        }
    }
}

impl WalletSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        Self {
            db_path: url,
            carts: CartApi::new(db.clone()),
            orders: OrderFlowApi::new(db.clone(), EventProducers::default()),
            ledger: LedgerApi::new(db.clone()),
            top_ups: TopUpApi::new(db.clone()),
            db,
            accounts: HashMap::new(),
            products: HashMap::new(),
            last_order: None,
            last_error: None,
        }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
