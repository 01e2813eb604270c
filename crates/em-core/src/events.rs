//! Application event system.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring buffer of recent events so late SSE subscribers can catch up.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::VideoId;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// Payload describing what happened to a video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    VideoQueued {
        video_id: VideoId,
    },
    VideoEncoding {
        video_id: VideoId,
    },
    VideoProgress {
        video_id: VideoId,
        progress: u8,
    },
    VideoCompleted {
        video_id: VideoId,
    },
    VideoFailed {
        video_id: VideoId,
        error: String,
    },
    VideoRecovered {
        count: usize,
    },
    VideoDeleted {
        video_id: VideoId,
    },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus whose broadcast channel holds `capacity`
    /// undelivered events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast an event and remember it in the ring buffer.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        self.recent.read().iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        let video_id = VideoId::new();
        bus.broadcast(EventPayload::VideoCompleted { video_id });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.payload, EventPayload::VideoCompleted { video_id });
    }

    #[test]
    fn recent_events_capped() {
        let bus = EventBus::new(256);
        let video_id = VideoId::new();
        for _ in 0..150 {
            bus.broadcast(EventPayload::VideoQueued { video_id });
        }
        assert_eq!(bus.recent_events(200).len(), MAX_RECENT_EVENTS);
    }

    #[test]
    fn recent_events_newest_first() {
        let bus = EventBus::new(16);
        let video_id = VideoId::new();
        for progress in [10, 20, 30] {
            bus.broadcast(EventPayload::VideoProgress { video_id, progress });
        }
        bus.broadcast(EventPayload::VideoCompleted { video_id });

        let recent = bus.recent_events(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].payload, EventPayload::VideoCompleted { video_id });
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.broadcast(EventPayload::VideoFailed {
            video_id: VideoId::new(),
            error: "boom".into(),
        });
    }

    #[test]
    fn payload_is_tagged() {
        let json = serde_json::to_value(EventPayload::VideoRecovered { count: 3 }).unwrap();
        assert_eq!(json["type"], "video_recovered");
        assert_eq!(json["count"], 3);
    }
}
