//! The per-request mutable execution context.

use super::{MetadataBag, ScopedBag};
use crate::stages::Stage;
use crate::utils::{generate_request_id, iso_timestamp, now_utc, Timestamp};
use parking_lot::RwLock;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// An error captured during pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct CapturedError {
    /// The stage the error was captured in, when attributable.
    pub stage: Option<Stage>,
    /// The middleware that failed, when attributable.
    pub middleware: Option<String>,
    /// Rendered error message.
    pub message: String,
    /// When the error was captured (ISO 8601).
    pub at: String,
}

impl CapturedError {
    /// Creates a captured error.
    #[must_use]
    pub fn new(stage: Option<Stage>, middleware: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            stage,
            middleware: middleware.map(String::from),
            message: message.into(),
            at: iso_timestamp(),
        }
    }
}

/// The mutable record carried alongside one `execute` invocation.
///
/// Exactly one context exists per invocation; its `request_id` is immutable
/// after creation. The context is registered in the active-context registry
/// for the duration of the call and removed unconditionally afterwards.
#[derive(Debug)]
pub struct RequestContext {
    request_id: Uuid,
    started_at: Timestamp,
    start: Instant,
    request: serde_json::Value,
    errors: RwLock<Vec<CapturedError>>,
    /// General-purpose metadata shared across middleware.
    pub metadata: MetadataBag,
    /// Middleware-scoped side channel keyed by `(middleware_name, key)`.
    pub scoped: ScopedBag,
}

impl RequestContext {
    /// Creates a context for one `execute` invocation.
    #[must_use]
    pub fn new(request: serde_json::Value) -> Self {
        Self {
            request_id: generate_request_id(),
            started_at: now_utc(),
            start: Instant::now(),
            request,
            errors: RwLock::new(Vec::new()),
            metadata: MetadataBag::new(),
            scoped: ScopedBag::new(),
        }
    }

    /// The unique identifier for this invocation.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The wall-clock time the invocation started.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// The inbound request value as received by `execute`.
    #[must_use]
    pub fn request(&self) -> &serde_json::Value {
        &self.request
    }

    /// Time elapsed since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Appends an error to the ordered error list.
    pub fn record_error(&self, error: CapturedError) {
        debug!(
            request_id = %self.request_id,
            stage = ?error.stage,
            middleware = ?error.middleware,
            "captured pipeline error: {}", error.message
        );
        self.errors.write().push(error);
    }

    /// Returns a copy of the captured errors, in capture order.
    #[must_use]
    pub fn errors(&self) -> Vec<CapturedError> {
        self.errors.read().clone()
    }

    /// Number of errors captured so far.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.read().len()
    }
}
