//! Stateless pub-sub for engine events.
//!
//! Components subscribe to events such as a settled order or an issued refund and react to them. Handlers receive only
//! the event itself and have no access to engine state. Events are published after the unit of work that caused them
//! has committed, so a handler never sees an event for a change that was rolled back.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handlers to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Only producers may keep the channel open.
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move { (handler)(ev).await });
            while jobs.try_join_next().is_some() {}
        }
        while let Some(result) = jobs.join_next().await {
            if let Err(e) = result {
                warn!("📬️ An event handler did not complete: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicI64, Ordering};

    use wallet_common::Pesewas;

    use super::*;

    #[tokio::test]
    async fn all_published_events_are_handled() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicI64::new(0));
        let t2 = total.clone();
        let handler = Arc::new(move |amount: Pesewas| {
            let total = total.clone();
            Box::pin(async move {
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
                total.fetch_add(amount.value(), Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(1, handler);
        let refunds = event_handler.subscribe();
        let debits = event_handler.subscribe();
        tokio::spawn(async move {
            for _ in 0..4 {
                refunds.publish_event(Pesewas::from(3_000)).await;
            }
        });
        tokio::spawn(async move {
            for _ in 0..3 {
                debits.publish_event(Pesewas::from(-6_000)).await;
            }
        });
        event_handler.start_handler().await;
        assert_eq!(t2.load(Ordering::SeqCst), -6_000);
    }
}
