//! Fire-and-forget side channels for notification side effects.
//!
//! The engine never talks to SMTP (or any other delivery transport) directly. Instead it
//! publishes events onto an in-process relay and the host decides what to do with them, e.g.
//! register a hook that sends a billing email. Publishing never fails the originating write.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventProducer, EventRelay, Handler};
pub use event_types::BillingEmailEvent;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
