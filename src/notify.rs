use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{Channel, Event};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for table-change notifications, one channel per table.
/// Open booking views subscribe to learn when their snapshot went stale.
pub struct NotifyHub {
    channels: DashMap<Channel, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to changes on `channel`, creating it if needed.
    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<Event> {
        self.channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish on the event's own channel. No-op if nobody is listening.
    pub fn send(&self, event: &Event) {
        if let Some(sender) = self.channels.get(&event.channel()) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.channels
            .get(&channel)
            .map_or(0, |sender| sender.receiver_count())
    }
}
