//! Event types for enrichment progress reporting
//!
//! Provides the `EnrichEvent` enum and the broadcast `EventBus` used by the
//! orchestrator to publish advisory telemetry. Nothing in a run's
//! correctness depends on an event being received.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Enrichment event types
///
/// Events are broadcast via `EventBus` and can be serialized for logging
/// or external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EnrichEvent {
    /// Run started dispatching
    RunStarted {
        run_id: Uuid,
        /// Distinct names selected for this run
        selected: usize,
        /// Names already present in the checkpoint
        skipped: usize,
        /// Names that will be dispatched
        to_dispatch: usize,
        provider: String,
        tier: String,
        timestamp: DateTime<Utc>,
    },

    /// A classification attempt failed and will be retried
    TaskRetrying {
        run_id: Uuid,
        name: String,
        /// Attempts made so far (1-based)
        attempt: u32,
        delay_ms: u64,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// A task reached a terminal state and was checkpointed
    ///
    /// `completed` increases by one with every event of a run.
    TaskCompleted {
        run_id: Uuid,
        name: String,
        succeeded: bool,
        attempts: u32,
        completed: usize,
        total: usize,
        elapsed_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// Run-level cancellation observed; no new tasks will start
    RunCancelling {
        run_id: Uuid,
        in_flight: usize,
        timestamp: DateTime<Utc>,
    },

    /// Run finished (completed, cancelled or aborted)
    RunFinished {
        run_id: Uuid,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        interrupted: usize,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
}

impl EnrichEvent {
    /// Run this event belongs to
    pub fn run_id(&self) -> Uuid {
        match self {
            EnrichEvent::RunStarted { run_id, .. }
            | EnrichEvent::TaskRetrying { run_id, .. }
            | EnrichEvent::TaskCompleted { run_id, .. }
            | EnrichEvent::RunCancelling { run_id, .. }
            | EnrichEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a `tokio::sync::broadcast` channel. Cloning the bus
/// shares the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EnrichEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EnrichEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: EnrichEvent,
    ) -> Result<usize, broadcast::error::SendError<EnrichEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: EnrichEvent) {
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

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
