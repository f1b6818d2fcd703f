//! Lifecycle events
//!
//! An in-process broadcast bus. Services emit after each successful
//! mutation and on connection-flow outcomes; the CLI and any embedding UI
//! subscribe. Emitting never blocks and never fails: with no subscribers the
//! event is dropped, and a lagging subscriber loses the oldest events.
//!
//! ```
//! use libsocialelf::service::events::{Event, EventBus};
//!
//! # async fn example() {
//! let bus = EventBus::new(100);
//! let mut receiver = bus.subscribe();
//!
//! bus.emit(Event::PostDeleted {
//!     post_id: "post_1".to_string(),
//! });
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::FailureReason;
use crate::types::{Platform, PostStatus};

pub type EventReceiver = broadcast::Receiver<Event>;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}

impl EventBus {
    /// `capacity` is the per-subscriber buffer before old events are dropped
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    PostCreated {
        post_id: String,
        status: PostStatus,
        platforms: Vec<Platform>,
    },

    PostUpdated {
        post_id: String,
        /// Wire names of the fields the caller supplied
        fields: Vec<String>,
    },

    PostRescheduled {
        post_id: String,
        scheduled_for: DateTime<Utc>,
    },

    PostDeleted {
        post_id: String,
    },

    /// An optimistic calendar move was rejected and undone
    RescheduleReverted {
        post_id: String,
        message: String,
        /// False when the list could not be re-fetched and the view is stale
        view_refreshed: bool,
    },

    ConnectionStarted {
        profile_id: String,
        platform: Platform,
    },

    ConnectionEstablished {
        profile_id: String,
        platform: Platform,
        account: Option<String>,
    },

    ConnectionFailed {
        platform: Platform,
        reason: FailureReason,
        message: String,
    },

    ConnectionRemoved {
        profile_id: String,
        account_id: String,
    },
}
