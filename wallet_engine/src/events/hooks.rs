use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, OrderSettledEvent, RefundIssuedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_settled_producer: Vec<EventProducer<OrderSettledEvent>>,
    pub refund_issued_producer: Vec<EventProducer<RefundIssuedEvent>>,
}

pub struct EventHandlers {
    pub on_order_settled: Option<EventHandler<OrderSettledEvent>>,
    pub on_refund_issued: Option<EventHandler<RefundIssuedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_settled = hooks.on_order_settled.map(|f| EventHandler::new(buffer_size, f));
        let on_refund_issued = hooks.on_refund_issued.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_settled, on_refund_issued }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_settled {
            result.order_settled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_refund_issued {
            result.refund_issued_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_settled {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_refund_issued {
            tokio::spawn(handler.start_handler());
        }
    }
}

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_settled: Option<Handler<OrderSettledEvent>>,
    pub on_refund_issued: Option<Handler<RefundIssuedEvent>>,
}

impl EventHooks {
    pub fn on_order_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderSettledEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_order_settled = Some(Arc::new(f));
        self
    }

    pub fn on_refund_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(RefundIssuedEvent) -> BoxedFuture) + Send + Sync + 'static {
        self.on_refund_issued = Some(Arc::new(f));
        self
    }
}
