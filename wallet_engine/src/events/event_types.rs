use serde::{Deserialize, Serialize};
use wallet_common::Pesewas;

use crate::db_types::{LedgerEntry, Order, OrderItem};

/// Published after a cart submission or direct order has been debited and committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

impl OrderSettledEvent {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self { order, items }
    }

    pub fn amount(&self) -> Pesewas {
        self.order.total_price
    }
}

/// Published after a compensating credit for cancelled items has been committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundIssuedEvent {
    pub order_id: i64,
    pub entry: LedgerEntry,
}

impl RefundIssuedEvent {
    pub fn new(order_id: i64, entry: LedgerEntry) -> Self {
        Self { order_id, entry }
    }
}
