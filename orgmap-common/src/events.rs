//! Event types for the orgmap event system
//!
//! Provides shared event definitions and EventBus for orgmap services.
//! Events are broadcast via EventBus and can be serialized for SSE
//! transmission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Orgmap event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OrgmapEvent {
    /// Duplicate detection started for a batch of pending employers
    DetectionStarted {
        session_id: Uuid,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// Duplicate detection finished for one pending employer
    DetectionCompleted {
        session_id: Uuid,
        pending_id: Uuid,
        exact_matches: usize,
        similar_matches: usize,
        conflicting_aliases: usize,
        timestamp: DateTime<Utc>,
    },

    /// A duplicate group was merged into a single primary employer
    MergeCompleted {
        primary_id: Uuid,
        subsumed: usize,
        timestamp: DateTime<Utc>,
    },

    /// A store-side merge failed; the decision still points at the
    /// intended primary and the operator must reconcile manually
    MergeFailed {
        primary_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Import commit started
    ImportStarted {
        session_id: Uuid,
        total: usize,
        timestamp: DateTime<Utc>,
    },

    /// One pending employer was committed (created or matched)
    ImportItemCompleted {
        session_id: Uuid,
        pending_id: Uuid,
        employer_id: Uuid,
        created: bool,
        timestamp: DateTime<Utc>,
    },

    /// One pending employer failed to commit; the batch continues
    ImportItemFailed {
        session_id: Uuid,
        pending_id: Uuid,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Import commit finished (or was cancelled between items)
    ImportCompleted {
        session_id: Uuid,
        created: usize,
        matched: usize,
        errors: usize,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast event bus shared by the orchestrating flow and SSE clients
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrgmapEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered before old events are
    /// dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<OrgmapEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Dropped silently when no subscriber is listening; progress events
    /// are advisory and never affect control flow.
    pub fn emit(&self, event: OrgmapEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::trace!("No event subscribers: {}", e);
        }
    }
}
