//! Fan-out of storage events to in-process subscribers.
//!
//! Built on `tokio::sync::broadcast` for multi-producer, multi-consumer
//! semantics. Events carry a space-separated tag string; subscribers filter
//! on whichever tag tokens they care about (for a saved operation:
//! `saved`, `source-{S}`, `hash-{H}`, `txhash-{T}`, `source-type-{S}{Type}`).

use isaac_types::BlockOperation;
use std::sync::OnceLock;
use tokio::sync::broadcast;
use tracing::trace;

const CHANNEL_CAPACITY: usize = 1024;

static BLOCK_OPERATIONS: OnceLock<Observer> = OnceLock::new();

/// The process-wide bus announcing saved block operations.
pub fn block_operations() -> &'static Observer {
    BLOCK_OPERATIONS.get_or_init(|| Observer::new(CHANNEL_CAPACITY))
}

/// One announcement on the bus.
#[derive(Debug, Clone)]
pub struct ObserverEvent {
    /// Space-separated tag tokens.
    pub tags: String,
    /// The record the event is about.
    pub operation: BlockOperation,
}

impl ObserverEvent {
    /// Whether `tag` appears among this event's tag tokens.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.split_whitespace().any(|token| token == tag)
    }
}

/// A broadcast bus for storage events.
pub struct Observer {
    sender: broadcast::Sender<ObserverEvent>,
}

impl Observer {
    fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverEvent> {
        self.sender.subscribe()
    }

    /// Announce an event. Lossy by design: with no subscribers the event
    /// is dropped, and a slow subscriber sees `Lagged` rather than
    /// backpressuring the storage path.
    pub fn trigger(&self, tags: &str, operation: &BlockOperation) {
        trace!(tags, hash = %operation.hash, "observer event");
        let _ = self.sender.send(ObserverEvent {
            tags: tags.to_string(),
            operation: operation.clone(),
        });
    }
}
