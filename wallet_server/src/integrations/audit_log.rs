use futures::future::BoxFuture;
use log::*;
use wallet_engine::events::{EventHandlers, EventHooks, OrderSettledEvent, RefundIssuedEvent};

pub const AUDIT_EVENT_BUFFER_SIZE: usize = 25;

/// Writes settled orders and issued refunds to the `wallet::audit` log target.
///
/// The ledger is the record of truth. This trail exists so that operators can follow money movements in the logs
/// without querying the store.
pub fn create_audit_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_settled(|ev| {
        info!(target: "wallet::audit", "{}", settled_line(&ev));
        no_op()
    });
    hooks.on_refund_issued(|ev| {
        info!(target: "wallet::audit", "{}", refund_line(&ev));
        no_op()
    });
    EventHandlers::new(AUDIT_EVENT_BUFFER_SIZE, hooks)
}

fn settled_line(ev: &OrderSettledEvent) -> String {
    format!(
        "📬️ Order #{} settled for account #{}. {} items, {} debited",
        ev.order.id,
        ev.order.account_id,
        ev.items.len(),
        ev.amount()
    )
}

fn refund_line(ev: &RefundIssuedEvent) -> String {
    format!(
        "📬️ Refund of {} issued to account #{} for order #{}. Balance is now {}",
        ev.entry.amount, ev.entry.account_id, ev.order_id, ev.entry.balance
    )
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}
