//! Per-user realtime change channels.
//!
//! Each `(user, topic)` pair owns a `watch` channel holding the most recent
//! change, so a slow subscriber skips intermediate states and always
//! observes the latest row.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

/// Channel topics a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Notification rows
    Notifications,
    /// Subscription status
    Subscription,
    /// Assistant request status
    Assistant,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Notifications => "notifications",
            Topic::Subscription => "subscription",
            Topic::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "notifications" => Some(Topic::Notifications),
            "subscription" => Some(Topic::Subscription),
            "assistant" => Some(Topic::Assistant),
            _ => None,
        }
    }
}

/// A change pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub topic: Topic,
    pub payload: serde_json::Value,
    pub at: DateTime<Utc>,
}

type Slot = Option<ChangeEvent>;

/// Registry of per-user channels.
#[derive(Default)]
pub struct RealtimeHub {
    channels: Mutex<HashMap<(Uuid, Topic), watch::Sender<Slot>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the latest state for a user's topic.
    pub fn publish(&self, user_id: Uuid, topic: Topic, payload: serde_json::Value) {
        let event = ChangeEvent {
            topic,
            payload,
            at: Utc::now(),
        };

        let Ok(mut channels) = self.channels.lock() else {
            tracing::error!("Realtime hub lock poisoned; dropping {} event", topic.as_str());
            return;
        };
        match channels.get(&(user_id, topic)) {
            Some(sender) => {
                sender.send_replace(Some(event));
            }
            None => {
                let (sender, _) = watch::channel(Some(event));
                channels.insert((user_id, topic), sender);
            }
        }
    }

    /// Subscribe to a user's topic. The receiver starts at the latest state.
    pub fn subscribe(&self, user_id: Uuid, topic: Topic) -> watch::Receiver<Slot> {
        let mut channels = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .entry((user_id, topic))
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    /// Latest event published for a user's topic.
    pub fn latest(&self, user_id: Uuid, topic: Topic) -> Option<ChangeEvent> {
        let channels = self.channels.lock().ok()?;
        channels
            .get(&(user_id, topic))
            .and_then(|sender| sender.borrow().clone())
    }

    /// Drop channels nobody is listening to.
    pub fn prune_idle(&self) -> usize {
        let Ok(mut channels) = self.channels.lock() else {
            return 0;
        };
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }
}
