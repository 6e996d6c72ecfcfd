use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{BillingEmailEvent, EventProducer, EventRelay, Handler};

/// The producer handles injected into APIs that raise side-channel events.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub billing_email_producer: Vec<EventProducer<BillingEmailEvent>>,
}

pub struct EventHandlers {
    pub on_billing_email: Option<EventRelay<BillingEmailEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_billing_email = hooks.on_billing_email.map(|f| EventRelay::new(buffer_size, f));
        Self { on_billing_email }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(relay) = &self.on_billing_email {
            result.billing_email_producer.push(relay.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(relay) = self.on_billing_email {
            tokio::spawn(async move {
                relay.start_relay().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_billing_email: Option<Handler<BillingEmailEvent>>,
}

impl EventHooks {
    pub fn on_billing_email<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BillingEmailEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_billing_email = Some(Arc::new(f));
        self
    }
}
