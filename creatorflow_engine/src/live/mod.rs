//! Live notification fan-out.
//!
//! Connected viewers (a user can have several open sessions) each register a channel with the
//! [`NotificationStream`] registry. The notification pipeline pushes freshly persisted records to
//! every channel the owning user has attached; when nobody is watching, the push is dropped and
//! the durable record remains the source of truth.
mod registry;
mod stream_events;

pub use registry::{ChannelClosed, ChannelId, LiveChannel, MpscChannel, NotificationStream};
pub use stream_events::{NotificationPayload, StreamEvent};
