use wallet_common::Pesewas;

use crate::{
    db_types::{CartContents, CartItem, FulfillmentStatus, NewOrderItem, Order, OrderItem, OrderWithItems},
    traits::WalletError,
    wallet_api::order_objects::{OrderQueryFilter, StatusChange},
};

#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// Adds `quantity` units of a product to the account's cart, creating the cart if necessary. The line price is
    /// captured at the current catalog price.
    async fn add_item(
        &self,
        account_id: i64,
        product_id: i64,
        quantity: i64,
        dest_number: Option<String>,
    ) -> Result<CartItem, WalletError>;

    /// The account's cart with its lines, or `None` if the account has never added anything.
    async fn fetch_cart(&self, account_id: i64) -> Result<Option<CartContents>, WalletError>;

    /// Removes one cart item. Returns `false` if it was already gone.
    async fn remove_item(&self, cart_item_id: i64) -> Result<bool, WalletError>;

    /// Empties the account's cart and returns the number of items removed.
    async fn clear_cart(&self, account_id: i64) -> Result<u64, WalletError>;
}

#[allow(async_fn_in_trait)]
pub trait SettlementManagement {
    /// Converts the account's cart into an order and debits its total at current catalog prices, in one unit of work.
    ///
    /// The cart is emptied on success. On any failure nothing changes: no order, no debit, and the cart is intact.
    async fn submit_cart(&self, account_id: i64, dest_number: Option<String>) -> Result<OrderWithItems, WalletError>;

    /// Creates an order from an externally resolved list of items and debits `total` exactly once.
    ///
    /// The caller is trusted to have priced the items; `total` is not checked against the catalog.
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

#[allow(async_fn_in_trait)]
pub trait FulfillmentManagement {
    /// Moves a single order item to `status`. Cancelling credits the item's charged amount back to the account, once.
    async fn set_item_status(&self, item_id: i64, status: FulfillmentStatus) -> Result<StatusChange, WalletError>;

    /// Moves every item of an order to `status`. If any item cannot make the transition, nothing changes.
    ///
    /// Cancelling credits back whatever part of the order's debit has not already been refunded item by item.
    async fn set_order_items_status(
        &self,
        order_id: i64,
        status: FulfillmentStatus,
    ) -> Result<StatusChange, WalletError>;

    /// Overrides the order-level status without touching its items, and records the change as a zero-amount
    /// `ORDER_STATUS` ledger entry. Cancelling is refused here, since only item cancellations issue refunds.
    async fn set_order_status(&self, order_id: i64, status: FulfillmentStatus) -> Result<Order, WalletError>;

    /// Marks every item that is currently `Processing` as `Completed`.
    async fn complete_processing_items(&self) -> Result<Vec<OrderItem>, WalletError>;
}
