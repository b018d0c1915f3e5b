use std::fmt::Debug;

use log::*;
use wallet_common::Pesewas;

use crate::{
    db_types::{FulfillmentStatus, NewOrderItem, Order, OrderItem, OrderWithItems},
    events::{EventProducers, OrderSettledEvent, RefundIssuedEvent},
    traits::{FulfillmentManagement, SettlementManagement, WalletError},
    wallet_api::order_objects::{OrderQueryFilter, StatusChange},
};

/// Parses a fulfillment status as supplied by a caller. Unknown statuses are rejected with
/// [`WalletError::InvalidStatus`].
pub fn parse_status(status: &str) -> Result<FulfillmentStatus, WalletError> {
    status.trim().parse::<FulfillmentStatus>().map_err(|e| WalletError::InvalidStatus(e.to_string()))
}

/// `OrderFlowApi` is the primary API for turning carts into paid orders and for moving those orders through
/// fulfillment.
///
/// Events are published only after the corresponding unit of work has committed.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> OrderFlowApi<B>
where B: SettlementManagement + FulfillmentManagement
{
    /// Settles the account's cart. See [`SettlementManagement::submit_cart`].
    pub async fn submit_cart(&self, account_id: i64, dest_number: Option<String>) -> Result<OrderWithItems, WalletError> {
        let result = self.db.submit_cart(account_id, dest_number).await?;
        self.call_order_settled_hook(&result).await;
        Ok(result)
    }

    /// Settles an externally priced order. See [`SettlementManagement::create_direct_order`].
    pub async fn create_direct_order(
        &self,
        account_id: i64,
        items: Vec<NewOrderItem>,
        total: Pesewas,
    ) -> Result<OrderWithItems, WalletError> {
        let result = self.db.create_direct_order(account_id, items, total).await?;
        self.call_order_settled_hook(&result).await;
        Ok(result)
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Option<OrderWithItems>, WalletError> {
        self.db.fetch_order(order_id).await
    }

    pub async fn orders_for_account(&self, account_id: i64) -> Result<Vec<Order>, WalletError> {
        self.db.orders_for_account(account_id).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, WalletError> {
        trace!("📦️ Searching orders. {query}");
        self.db.search_orders(query).await
    }

    pub async fn set_item_status(&self, item_id: i64, status: &str) -> Result<StatusChange, WalletError> {
        let status = parse_status(status)?;
        let change = self.db.set_item_status(item_id, status).await?;
        self.call_refund_issued_hook(&change).await;
        Ok(change)
    }

    pub async fn set_order_items_status(&self, order_id: i64, status: &str) -> Result<StatusChange, WalletError> {
        let status = parse_status(status)?;
        let change = self.db.set_order_items_status(order_id, status).await?;
        self.call_refund_issued_hook(&change).await;
        Ok(change)
    }

    /// Overrides the order-level status. See [`FulfillmentManagement::set_order_status`].
    pub async fn set_order_status(&self, order_id: i64, status: &str) -> Result<Order, WalletError> {
        let status = parse_status(status)?;
        self.db.set_order_status(order_id, status).await
    }

    pub async fn complete_processing_items(&self) -> Result<Vec<OrderItem>, WalletError> {
        let completed = self.db.complete_processing_items().await?;
        info!("🚚️ {} processing items completed", completed.len());
        Ok(completed)
    }

    async fn call_order_settled_hook(&self, settled: &OrderWithItems) {
        for emitter in &self.producers.order_settled_producer {
            debug!("📦️ Notifying order settled hook subscribers");
            let event = OrderSettledEvent::new(settled.order.clone(), settled.items.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_refund_issued_hook(&self, change: &StatusChange) {
        let Some(entry) = &change.refund else {
            return;
        };
        for emitter in &self.producers.refund_issued_producer {
            debug!("🚚️ Notifying refund issued hook subscribers");
            let event = RefundIssuedEvent::new(change.order.id, entry.clone());
            emitter.publish_event(event).await;
        }
    }
}
