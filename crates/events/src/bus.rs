//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`JobEvent`]s. The
//! fulfillment engine publishes exactly one terminal event per job; the
//! notification router subscribes and handles external delivery. It is
//! designed to be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use synthpop_core::Fingerprint;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A deferred job completed and its dataset is available.
pub const EVENT_JOB_READY: &str = "job.ready";

/// A deferred job exhausted its retry budget and failed.
pub const EVENT_JOB_FAILED: &str = "job.failed";

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A job lifecycle event.
///
/// Constructed via [`JobEvent::new`] and enriched with
/// [`with_payload`](JobEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Dot-separated event name, e.g. `"job.ready"`.
    pub event_type: String,

    /// Fingerprint of the job the event is about.
    pub fingerprint: Fingerprint,

    /// Where the requester asked to be notified.
    pub contact_address: String,

    /// Free-form JSON payload carrying event-specific data
    /// (the result for `job.ready`, the reason for `job.failed`).
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    /// Create a new event for a job.
    pub fn new(
        event_type: impl Into<String>,
        fingerprint: Fingerprint,
        contact_address: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            fingerprint,
            contact_address: contact_address.into(),
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Whether this event marks a terminal job state.
    pub fn is_terminal(&self) -> bool {
        self.event_type == EVENT_JOB_READY || self.event_type == EVENT_JOB_FAILED
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`JobEvent`].
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// notification delivery is best-effort by design.
    pub fn publish(&self, event: JobEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
