//! Event types for the knowledge research event system
//!
//! Events are broadcast via [`EventBus`] and serialized for SSE transmission.
//! Emission is lossy: a research attempt never waits on, or fails because
//! of, its listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Knowledge research lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum KnowledgeEvent {
    /// A research attempt started and the record was marked in-progress
    ResearchStarted {
        /// Subject name
        name: String,
        /// When the attempt started
        timestamp: DateTime<Utc>,
    },

    /// A research attempt finished and the record was marked complete
    ResearchCompleted {
        /// Subject name
        name: String,
        /// Sources that contributed data during this attempt
        sources: Vec<String>,
        /// When the attempt completed
        timestamp: DateTime<Utc>,
    },

    /// A research attempt failed outside per-source error containment
    ResearchFailed {
        /// Subject name
        name: String,
        /// Failure message, as recorded on the knowledge record
        error: String,
        /// When the attempt failed
        timestamp: DateTime<Utc>,
    },
}

impl KnowledgeEvent {
    /// SSE event name
    pub fn event_type(&self) -> &'static str {
        match self {
            KnowledgeEvent::ResearchStarted { .. } => "ResearchStarted",
            KnowledgeEvent::ResearchCompleted { .. } => "ResearchCompleted",
            KnowledgeEvent::ResearchFailed { .. } => "ResearchFailed",
        }
    }

    /// Subject name the event refers to
    pub fn name(&self) -> &str {
        match self {
            KnowledgeEvent::ResearchStarted { name, .. }
            | KnowledgeEvent::ResearchCompleted { name, .. }
            | KnowledgeEvent::ResearchFailed { name, .. } => name,
        }
    }
}

/// Broadcast bus for [`KnowledgeEvent`]s
///
/// Cloning is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<KnowledgeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    ///
    /// # Examples
    ///
    /// ```
    /// use dphil_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<KnowledgeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: KnowledgeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
