use mockall::mock;
use wallet_common::Pesewas;
use wallet_engine::{
    db_types::{
        Account,
        CartContents,
        CartItem,
        FulfillmentStatus,
        NewAccount,
        NewOrderItem,
        NewProduct,
        Order,
        OrderItem,
        OrderWithItems,
        Product,
    },
    order_objects::{OrderQueryFilter, StatusChange},
    traits::{
        AccountManagement,
        CartManagement,
        FulfillmentManagement,
        ProductCatalog,
        SettlementManagement,
        WalletError,
    },
};

mock! {
    pub AccountManager {}
    impl AccountManagement for AccountManager {
        async fn create_account(&self, account: NewAccount) -> Result<Account, WalletError>;
        async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, WalletError>;
    }
}

mock! {
    pub Catalog {}
    impl ProductCatalog for Catalog {
        async fn insert_product(&self, product: NewProduct) -> Result<Product, WalletError>;
        async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, WalletError>;
        async fn update_price(&self, product_id: i64, price: Pesewas) -> Result<Product, WalletError>;
        async fn set_stock(&self, product_id: i64, stock: i64) -> Result<Product, WalletError>;
    }
}

mock! {
    pub CartManager {}
    impl CartManagement for CartManager {
        async fn add_item(
            &self,
            account_id: i64,
            product_id: i64,
            quantity: i64,
            dest_number: Option<String>,
        ) -> Result<CartItem, WalletError>;
        async fn fetch_cart(&self, account_id: i64) -> Result<Option<CartContents>, WalletError>;
        async fn remove_item(&self, cart_item_id: i64) -> Result<bool, WalletError>;
        async fn clear_cart(&self, account_id: i64) -> Result<u64, WalletError>;
    }
}

mock! {
    pub OrderStore {}
    impl SettlementManagement for OrderStore {
        async fn submit_cart(&self, account_id: i64, dest_number: Option<String>) -> Result<OrderWithItems, WalletError>;
        async fn create_direct_order(
            &self,
            account_id: i64,
            items: Vec<NewOrderItem>,
            total: Pesewas,
        ) -> Result<OrderWithItems, WalletError>;
        async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderWithItems>, WalletError>;
        async fn orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, WalletError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, WalletError>;
    }
    impl FulfillmentManagement for OrderStore {
        async fn set_item_status(&self, item_id: i64, status: FulfillmentStatus) -> Result<StatusChange, WalletError>;
        async fn set_order_items_status(
            &self,
            order_id: i64,
            status: FulfillmentStatus,
        ) -> Result<StatusChange, WalletError>;
        async fn set_order_status(&self, order_id: i64, status: FulfillmentStatus) -> Result<Order, WalletError>;
        async fn complete_processing_items(&self) -> Result<Vec<OrderItem>, WalletError>;
    }
}
