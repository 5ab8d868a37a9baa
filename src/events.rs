//! Event fan-out for collection and alarm cycles.
//!
//! The bus wraps Tokio broadcast channels with two publish variants:
//! topic-scoped (subscribers of one device, or the alarms feed) and
//! fleet-wide broadcast. Delivery is best-effort, at-most-once: events for
//! slow or absent subscribers are dropped, and a fresh subscriber is
//! expected to pull current state through the store queries instead of
//! replaying history.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

use crate::NormalizedStatus;
use crate::store::schema::AlarmRecord;

/// Topic carrying alarm creation events.
pub const ALARMS_TOPIC: &str = "alarms";

/// Topic scoped to a single device's status events.
pub fn device_topic(device_id: &str) -> String {
    format!("device-{device_id}")
}

#[derive(Debug, Clone)]
pub enum Event {
    /// Full status snapshot, scoped to the polled device's topic.
    DeviceStatus {
        device_id: String,
        status: NormalizedStatus,
        timestamp: DateTime<Utc>,
    },

    /// Lightweight fleet-wide update after every successful poll.
    DeviceStatusUpdate {
        device_id: String,
        disk_usage_rate: f64,
        online: bool,
        timestamp: DateTime<Utc>,
    },

    NewAlarm {
        alarm: AlarmRecord,
    },

    AlarmCountUpdate {
        count: usize,
        timestamp: DateTime<Utc>,
    },

    AlarmHandled {
        alarm_id: String,
        handler_id: String,
    },
}

/// Injected publish/subscribe port shared by the collector and alarm engine.
pub struct EventBus {
    topics: RwLock<HashMap<String, broadcast::Sender<Event>>>,
    all: broadcast::Sender<Event>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (all, _) = broadcast::channel(capacity);
        Self {
            topics: RwLock::new(HashMap::new()),
            all,
            capacity,
        }
    }

    /// Publish to a single topic's subscribers.
    ///
    /// A topic nobody has subscribed to has no channel yet; the event is
    /// dropped without allocating one.
    pub fn publish_to(&self, topic: &str, event: Event) {
        let topics = self.topics.read().expect("topic lock poisoned");
        if let Some(sender) = topics.get(topic) {
            match sender.send(event) {
                Ok(receivers) => trace!("published to {topic} ({receivers} receivers)"),
                Err(_) => trace!("no receivers left on {topic}"),
            }
        } else {
            trace!("no subscribers on {topic}, dropping event");
        }
    }

    /// Publish to every fleet-wide subscriber.
    pub fn broadcast(&self, event: Event) {
        // It's OK if there are no subscribers.
        let _ = self.all.send(event);
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event> {
        let mut topics = self.topics.write().expect("topic lock poisoned");
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.all.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
