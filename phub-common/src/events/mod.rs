//! Event types for the ProjectHub client
//!
//! Provides the client event enum and the EventBus used by the session
//! resolver and mutation controllers to publish what happened.

mod session_types;

pub use session_types::{DegradeReason, MutationKind, SessionStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Client event types
///
/// Events are broadcast via EventBus and can be serialized for logging or
/// forwarding to a UI shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// The authoritative session changed
    SessionChanged {
        /// Status after the change
        status: SessionStatus,
        /// Identity-event generation the change belongs to
        generation: u64,
        /// When the change was committed
        timestamp: DateTime<Utc>,
    },

    /// A resolution finished after a newer identity event and was dropped
    StaleResolutionDiscarded {
        /// Generation of the dropped resolution
        generation: u64,
        /// Generation that was current at completion time
        current: u64,
        timestamp: DateTime<Utc>,
    },

    /// A mutation was confirmed by the server and reconciled
    MutationApplied {
        kind: MutationKind,
        target_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A mutation failed and the displayed value was reverted
    MutationReverted {
        kind: MutationKind,
        target_id: String,
        /// Human-readable failure
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Central event distribution for the client
///
/// Wraps a tokio broadcast channel. Multiple subscribers each receive every
/// event published after they subscribed.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use phub_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ClientEvent,
    ) -> Result<usize, broadcast::error::SendError<ClientEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
