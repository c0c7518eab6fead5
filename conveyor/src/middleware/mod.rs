//! Middleware traits, one shape per stage family.
//!
//! The engine is polymorphic over four shapes: sequential transforms for the
//! pre/post-processing stages, interceptors for the onion chain, and
//! best-effort error and cleanup handlers. The [`Middleware`] sum type backs
//! the generic registration API.

mod conditional;
mod func;

pub use conditional::ConditionalInterceptor;
pub use func::{FnInterceptor, FnTransform};

use crate::chain::Next;
use crate::context::RequestContext;
use crate::errors::{MiddlewareError, PipelineError};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A sequential transform over the stage payload.
///
/// Transforms run in registration order; each receives the payload produced
/// by its predecessor and the request context for side-channel writes.
#[async_trait]
pub trait Transform: Send + Sync {
    /// Name used in logs and captured errors.
    fn name(&self) -> &str;

    /// Applies the transform, returning the payload fed to the next middleware.
    async fn apply(
        &self,
        payload: serde_json::Value,
        ctx: &RequestContext,
    ) -> Result<serde_json::Value, MiddlewareError>;
}

/// A request-handling interceptor composed into the onion chain.
///
/// Returning without running `next` short-circuits every downstream
/// interceptor and the terminal handler.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handles the request, optionally delegating downstream via `next`.
    async fn handle(
        &self,
        request: serde_json::Value,
        next: Next,
    ) -> Result<serde_json::Value, MiddlewareError>;
}

/// A best-effort observer of the failure path.
///
/// A handler's own failure is logged and never aborts the remaining handlers.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Observes a pipeline failure.
    async fn on_error(&self, error: &PipelineError, ctx: &RequestContext) -> anyhow::Result<()>;
}

/// A best-effort handler always invoked before the context is released.
#[async_trait]
pub trait CleanupHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Releases per-request resources.
    async fn cleanup(&self, ctx: &RequestContext) -> anyhow::Result<()>;
}

/// A middleware of any shape, for the generic registration API.
pub enum Middleware {
    /// A sequential transform (pre/post-processing stages).
    Transform(Arc<dyn Transform>),
    /// An onion-chain interceptor (request-handling stage).
    Interceptor(Arc<dyn Interceptor>),
    /// A failure-path handler (error-handling stage).
    ErrorHandler(Arc<dyn ErrorHandler>),
    /// A cleanup handler (cleanup stage).
    Cleanup(Arc<dyn CleanupHandler>),
}

impl Middleware {
    /// The shape's name, used in registration errors.
    #[must_use]
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Transform(_) => "transform",
            Self::Interceptor(_) => "interceptor",
            Self::ErrorHandler(_) => "error_handler",
            Self::Cleanup(_) => "cleanup",
        }
    }

    /// The wrapped middleware's own name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Transform(inner) => inner.name(),
            Self::Interceptor(inner) => inner.name(),
            Self::ErrorHandler(inner) => inner.name(),
            Self::Cleanup(inner) => inner.name(),
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("shape", &self.shape())
            .field("name", &self.name())
            .finish()
    }
}
