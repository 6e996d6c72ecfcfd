//! Simple stateless pub-sub event relay.
//!
//! Components publish events through cheap cloneable [`EventProducer`] handles; a single
//! [`EventRelay`] drains the channel and runs the registered handler for each event, in order.
//! Handlers are async but have no access to engine state; all they receive is the event itself.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::mpsc;

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventRelay<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventRelay<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, listener) = mpsc::channel(buffer_size);
        Self { listener, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Drains the channel until every producer has been dropped. Events are handled one at a
    /// time, so a slow handler applies back-pressure through the bounded channel rather than
    /// spawning unbounded work.
    pub async fn start_relay(mut self) {
        debug!("📬️ Event relay started");
        // Drop the internal sender so the relay shuts down when the last producer goes away.
        drop(self.sender);
        while let Some(event) = self.listener.recv().await {
            trace!("📬️ Handling event");
            (self.handler)(event).await;
            trace!("📬️ Event handled");
        }
        debug!("📬️ Event relay has shut down");
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

    /// Queues the event for the relay. A full or closed channel is logged and swallowed; the
    /// caller's write has already been made durable and must not fail because of a side channel.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;

    #[tokio::test]
    async fn relay_runs_handler_for_every_event() {
        let _ = env_logger::try_init();
        let total = Arc::new(AtomicU64::new(0));
        let tally = total.clone();
        let handler = Arc::new(move |v: u64| {
            let tally = tally.clone();
            Box::pin(async move {
                tally.fetch_add(v, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let relay = EventRelay::new(4, handler);
        let producer_1 = relay.subscribe();
        let producer_2 = relay.subscribe();
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_1.publish_event(i * 2 + 1).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5u64 {
                producer_2.publish_event(i * 2).await;
            }
        });

        relay.start_relay().await;
        assert_eq!(total.load(Ordering::SeqCst), 45);
    }
}
