//! Error types for the conveyor engine.
//!
//! The taxonomy separates failures by where they arise: sequential transform
//! stages, the interceptor chain, the best-effort error/cleanup phases, and
//! the whole-call execution budget.

use crate::stages::Stage;
use thiserror::Error;

/// The error channel for middleware bodies.
///
/// `Rejected` is a deliberate verdict about the request and always reaches
/// the failure path; `Failed` is an incidental fault and is subject to the
/// error-recovery policy.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    /// The middleware rejected the request.
    #[error("request rejected: {reason}")]
    Rejected {
        /// Why the request was rejected.
        reason: String,
    },

    /// The middleware failed while processing.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl MiddlewareError {
    /// Creates a rejection with the given reason.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates an incidental failure from a message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Failed(anyhow::anyhow!(message))
    }

    /// Returns true if this error is a deliberate rejection.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// The top-level error type for pipeline execution.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A transform middleware failed during a sequential stage.
    #[error("{stage} middleware '{middleware}' failed: {source}")]
    StageMiddleware {
        /// The stage the middleware was registered under.
        stage: Stage,
        /// The failing middleware's name.
        middleware: String,
        /// The underlying failure.
        #[source]
        source: MiddlewareError,
    },

    /// A failure from within the built chain, raised by an interceptor or
    /// the terminal handler.
    #[error("handler chain failed: {source}")]
    HandlerChain {
        /// The underlying failure.
        #[source]
        source: MiddlewareError,
    },

    /// An error handler itself failed. Never propagated past its phase.
    #[error("error handler '{handler}' failed: {message}")]
    ErrorHandlerFailure {
        /// The failing handler's name.
        handler: String,
        /// Rendered failure message.
        message: String,
    },

    /// A cleanup handler failed. Never propagated past its phase.
    #[error("cleanup handler '{handler}' failed: {message}")]
    CleanupFailure {
        /// The failing handler's name.
        handler: String,
        /// Rendered failure message.
        message: String,
    },

    /// The whole-call execution budget expired.
    #[error("pipeline exceeded its execution budget of {budget_ms}ms")]
    Timeout {
        /// The configured budget in milliseconds.
        budget_ms: u64,
    },
}

impl PipelineError {
    /// Stable kind string used in recovery payloads and events.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StageMiddleware { .. } => "stage_middleware_error",
            Self::HandlerChain { .. } => "handler_chain_error",
            Self::ErrorHandlerFailure { .. } => "error_handler_failure",
            Self::CleanupFailure { .. } => "cleanup_failure",
            Self::Timeout { .. } => "pipeline_timeout",
        }
    }

    /// The stage this error originated from, when attributable.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageMiddleware { stage, .. } => Some(*stage),
            Self::HandlerChain { .. } => Some(Stage::RequestHandling),
            Self::ErrorHandlerFailure { .. } => Some(Stage::ErrorHandling),
            Self::CleanupFailure { .. } => Some(Stage::Cleanup),
            Self::Timeout { .. } => None,
        }
    }
}

/// Error returned by the generic registration API on a shape mismatch.
#[derive(Debug, Clone, Error)]
#[error("middleware shape '{shape}' cannot be registered under stage '{stage}'")]
pub struct RegistrationError {
    /// The stage registration was attempted under.
    pub stage: Stage,
    /// The shape of the rejected middleware.
    pub shape: &'static str,
}
