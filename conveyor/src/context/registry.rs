//! The shared registry of in-flight request contexts.

use super::RequestContext;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Concurrency-safe mapping from request ID to in-flight context.
///
/// Entries exist only between context creation and pipeline completion.
/// Insert/delete races under load are the expected case, not an edge case.
#[derive(Debug, Default)]
pub struct ActiveContextRegistry {
    contexts: DashMap<Uuid, Arc<RequestContext>>,
}

impl ActiveContextRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context under its request ID.
    pub fn insert(&self, ctx: Arc<RequestContext>) {
        self.contexts.insert(ctx.request_id(), ctx);
    }

    /// Removes a context, returning it if it was present.
    pub fn remove(&self, request_id: Uuid) -> Option<Arc<RequestContext>> {
        self.contexts.remove(&request_id).map(|(_, ctx)| ctx)
    }

    /// Looks up a context by request ID.
    #[must_use]
    pub fn get(&self, request_id: Uuid) -> Option<Arc<RequestContext>> {
        self.contexts.get(&request_id).map(|entry| Arc::clone(&entry))
    }

    /// Number of contexts currently in flight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns true if no context is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// IDs of all contexts currently in flight.
    #[must_use]
    pub fn active_ids(&self) -> Vec<Uuid> {
        self.contexts.iter().map(|entry| *entry.key()).collect()
    }

    /// Removes contexts whose age exceeds `max_age`.
    ///
    /// Under normal operation `execute`'s unconditional deregistration keeps
    /// the registry tight; this is an operational safety valve for contexts
    /// leaked by an aborted task. Returns how many were removed.
    pub fn purge_stale(&self, max_age: Duration) -> usize {
        let stale: Vec<Uuid> = self
            .contexts
            .iter()
            .filter(|entry| entry.value().elapsed() > max_age)
            .map(|entry| *entry.key())
            .collect();

        let mut purged = 0;
        for request_id in stale {
            if self.contexts.remove(&request_id).is_some() {
                warn!(request_id = %request_id, "purged stale request context");
                purged += 1;
            }
        }
        purged
    }
}
