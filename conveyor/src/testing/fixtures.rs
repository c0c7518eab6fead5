//! Middleware fixtures with observable side effects.

use crate::chain::Next;
use crate::context::RequestContext;
use crate::errors::{MiddlewareError, PipelineError};
use crate::middleware::{CleanupHandler, ErrorHandler, Interceptor, Transform};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A shared, ordered log of invocation labels.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label.
    pub fn push(&self, label: impl Into<String>) {
        self.entries.lock().push(label.into());
    }

    /// Returns a copy of the labels, in push order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Number of recorded labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// An interceptor that records its invocation and delegates downstream.
pub struct RecordingInterceptor {
    name: String,
    log: CallLog,
}

impl RecordingInterceptor {
    /// Creates a recording interceptor pushing `name` into `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

#[async_trait]
impl Interceptor for RecordingInterceptor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        request: serde_json::Value,
        next: Next,
    ) -> Result<serde_json::Value, MiddlewareError> {
        self.log.push(self.name.clone());
        next.run(request).await
    }
}

/// An interceptor that returns a fixed response without delegating.
pub struct ShortCircuitInterceptor {
    name: String,
    response: serde_json::Value,
    log: CallLog,
}

impl ShortCircuitInterceptor {
    /// Creates an interceptor that always answers with `response`.
    #[must_use]
    pub fn new(name: impl Into<String>, response: serde_json::Value, log: CallLog) -> Self {
        Self {
            name: name.into(),
            response,
            log,
        }
    }
}

#[async_trait]
impl Interceptor for ShortCircuitInterceptor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(
        &self,
        _request: serde_json::Value,
        _next: Next,
    ) -> Result<serde_json::Value, MiddlewareError> {
        self.log.push(self.name.clone());
        Ok(self.response.clone())
    }
}

/// A transform that inserts a marker key into an object payload.
pub struct MarkerTransform {
    name: String,
    key: String,
    value: serde_json::Value,
}

impl MarkerTransform {
    /// Creates a transform inserting `key: value` into the payload.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            value,
        }
    }
}

#[async_trait]
impl Transform for MarkerTransform {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(
        &self,
        mut payload: serde_json::Value,
        _ctx: &RequestContext,
    ) -> Result<serde_json::Value, MiddlewareError> {
        if let Some(obj) = payload.as_object_mut() {
            obj.insert(self.key.clone(), self.value.clone());
        }
        Ok(payload)
    }
}

/// A cleanup handler that counts its invocations.
pub struct CountingCleanup {
    name: String,
    count: Arc<AtomicUsize>,
}

impl CountingCleanup {
    /// Creates a cleanup handler incrementing `count` on each run.
    #[must_use]
    pub fn new(name: impl Into<String>, count: Arc<AtomicUsize>) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

#[async_trait]
impl CleanupHandler for CountingCleanup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn cleanup(&self, _ctx: &RequestContext) -> anyhow::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A cleanup handler that stores the context's error count on each run.
pub struct ErrorCountProbe {
    name: String,
    seen: Arc<AtomicUsize>,
}

impl ErrorCountProbe {
    /// Creates a probe writing the observed error count into `seen`.
    #[must_use]
    pub fn new(name: impl Into<String>, seen: Arc<AtomicUsize>) -> Self {
        Self {
            name: name.into(),
            seen,
        }
    }
}

#[async_trait]
impl CleanupHandler for ErrorCountProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn cleanup(&self, ctx: &RequestContext) -> anyhow::Result<()> {
        self.seen.store(ctx.error_count(), Ordering::SeqCst);
        Ok(())
    }
}

/// An error handler that records the error kinds it observes.
pub struct RecordingErrorHandler {
    name: String,
    log: CallLog,
}

impl RecordingErrorHandler {
    /// Creates a handler pushing `name:kind` labels into `log`.
    #[must_use]
    pub fn new(name: impl Into<String>, log: CallLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

#[async_trait]
impl ErrorHandler for RecordingErrorHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_error(&self, error: &PipelineError, _ctx: &RequestContext) -> anyhow::Result<()> {
        self.log.push(format!("{}:{}", self.name, error.kind()));
        Ok(())
    }
}

/// An error handler that itself fails on every invocation.
pub struct FailingErrorHandler {
    name: String,
}

impl FailingErrorHandler {
    /// Creates a handler that always fails.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl ErrorHandler for FailingErrorHandler {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_error(&self, _error: &PipelineError, _ctx: &RequestContext) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("handler '{}' failed deliberately", self.name))
    }
}
