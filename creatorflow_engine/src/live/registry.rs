use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
        Mutex,
    },
};

use log::*;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::live::StreamEvent;

/// Returned by [`LiveChannel::write`] when the underlying connection has gone away. The registry
/// reacts by detaching the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("The live channel is closed")]
pub struct ChannelClosed;

/// An abstract sink for live events. The registry does not care whether the other end is a
/// streaming HTTP response, a websocket, or a polling queue; it only needs a synchronous,
/// non-blocking write and an observable closed state.
pub trait LiveChannel: Send + Sync {
    fn write(&self, event: &StreamEvent) -> Result<(), ChannelClosed>;
}

/// Identifies one attached channel so it can be detached later. Ids are process-unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

/// The registry of live-connected viewers: user id → the channels currently open for that user.
///
/// The map is shared mutable state; a plain mutex guards it. No lock is held across an await
/// point, and writes are required to be non-blocking, so contention stays negligible.
#[derive(Default)]
pub struct NotificationStream {
    channels: Mutex<HashMap<i64, Vec<(ChannelId, Arc<dyn LiveChannel>)>>>,
    next_id: AtomicU64,
}

impl NotificationStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel for the user and returns its id.
    pub fn attach(&self, user_id: i64, channel: Arc<dyn LiveChannel>) -> ChannelId {
        let id = ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.entry(user_id).or_default().push((id, channel));
        debug!("📡️ Channel {id:?} attached for user #{user_id}");
        id
    }

    /// Removes a channel. The user's entry is pruned once its last channel is gone.
    pub fn detach(&self, user_id: i64, channel_id: ChannelId) {
        let mut channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(open) = channels.get_mut(&user_id) {
            open.retain(|(id, _)| *id != channel_id);
            if open.is_empty() {
                channels.remove(&user_id);
            }
            debug!("📡️ Channel {channel_id:?} detached for user #{user_id}");
        }
    }

    /// Writes the event to every channel the user has attached, detaching any that report
    /// closed. Returns the number of channels the event reached; zero when nobody is watching,
    /// in which case the event is simply dropped.
    pub fn publish(&self, user_id: i64, event: &StreamEvent) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(open) = channels.get_mut(&user_id) else {
            return 0;
        };
        let before = open.len();
        open.retain(|(id, channel)| match channel.write(event) {
            Ok(()) => true,
            Err(ChannelClosed) => {
                debug!("📡️ Channel {id:?} for user #{user_id} is closed. Detaching");
                false
            },
        });
        let delivered = open.len();
        if open.is_empty() {
            channels.remove(&user_id);
        }
        trace!("📡️ Event delivered to {delivered}/{before} channels for user #{user_id}");
        delivered
    }

    /// Writes a ping to every open channel, detaching the ones that fail. Returns how many
    /// channels were pruned.
    pub fn ping_all(&self) -> usize {
        let mut channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut pruned = 0;
        channels.retain(|user_id, open| {
            open.retain(|(id, channel)| match channel.write(&StreamEvent::Ping) {
                Ok(()) => true,
                Err(ChannelClosed) => {
                    debug!("📡️ Heartbeat failed on channel {id:?} for user #{user_id}. Detaching");
                    pruned += 1;
                    false
                },
            });
            !open.is_empty()
        });
        pruned
    }

    /// How many channels the user currently has attached.
    pub fn viewer_count(&self, user_id: i64) -> usize {
        let channels = self.channels.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        channels.get(&user_id).map(Vec::len).unwrap_or_default()
    }
}

//--------------------------------------    MpscChannel     ----------------------------------------------------------
/// A [`LiveChannel`] backed by an unbounded tokio channel. The receiving half is handed to
/// whatever owns the client connection; once the receiver is dropped, writes fail and the
/// registry detaches the channel.
pub struct MpscChannel {
    sender: mpsc::UnboundedSender<StreamEvent>,
}

impl MpscChannel {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StreamEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl LiveChannel for MpscChannel {
    fn write(&self, event: &StreamEvent) -> Result<(), ChannelClosed> {
        self.sender.send(event.clone()).map_err(|_| ChannelClosed)
    }
}
