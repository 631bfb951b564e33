//! Namespace lifecycle and record-store events
//!
//! The record store publishes [`RecordEvent`]s; the lifecycle manager
//! subscribes to them and purges vectors when an assignment goes away.
//! Handlers cannot fail the publisher: cleanup problems are only logged.

use std::sync::Arc;

use async_trait::async_trait;
use evalrag_vector::BestEffortIndex;
use tokio::sync::RwLock;

/// Lifecycle events emitted by the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    AssignmentDeleted { assignment_id: String },
}

/// Reacts to record-store events
#[async_trait]
pub trait RecordEventHandler: Send + Sync {
    async fn handle(&self, event: &RecordEvent);
}

/// Fan-out of record events to registered handlers
#[derive(Default)]
pub struct RecordEventBus {
    handlers: RwLock<Vec<Arc<dyn RecordEventHandler>>>,
}

impl RecordEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it receives every event published afterwards
    pub async fn subscribe(&self, handler: Arc<dyn RecordEventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Deliver an event to every handler in registration order.
    ///
    /// Returns the number of handlers notified.
    pub async fn publish(&self, event: RecordEvent) -> usize {
        let handlers = self.handlers.read().await.clone();
        tracing::debug!(event = ?event, handlers = handlers.len(), "Publishing record event");

        for handler in &handlers {
            handler.handle(&event).await;
        }
        handlers.len()
    }
}

/// Keeps index namespaces in step with assignment lifecycle
#[derive(Clone)]
pub struct NamespaceLifecycle {
    index: BestEffortIndex,
}

impl NamespaceLifecycle {
    pub fn new(index: BestEffortIndex) -> Self {
        Self { index }
    }

    /// Delete every vector of an assignment
    pub async fn purge(&self, assignment_id: &str) {
        tracing::info!(assignment_id = %assignment_id, backend = self.index.name(), "Purging assignment vectors");
        self.index.delete_namespace(assignment_id).await;
    }
}

#[async_trait]
impl RecordEventHandler for NamespaceLifecycle {
    async fn handle(&self, event: &RecordEvent) {
        match event {
            RecordEvent::AssignmentDeleted { assignment_id } => self.purge(assignment_id).await,
        }
    }
}
