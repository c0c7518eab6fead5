//! # Conveyor
//!
//! An asynchronous middleware pipeline execution engine.
//!
//! Conveyor takes an inbound request, runs it through ordered,
//! independently-registered processing stages, dispatches it through a nested
//! interceptor chain to a terminal handler, and guarantees cleanup and error
//! containment regardless of failure:
//!
//! - **Staged execution**: pre-processing and post-processing transforms run
//!   sequentially; request handling is a nested (onion) interceptor chain
//!   that can short-circuit.
//! - **Per-request contexts**: identity, timing, error accumulation, and a
//!   middleware-scoped side channel, tracked in a concurrent registry.
//! - **Failure containment**: configurable error recovery, plus best-effort
//!   error-handling and cleanup phases that always run.
//! - **Budget enforcement**: an optional whole-call execution budget.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conveyor::prelude::*;
//! use std::sync::Arc;
//!
//! // Set up the pipeline before serving traffic.
//! let mut pipeline = Pipeline::new(PipelineConfig::default());
//! pipeline
//!     .pre_processing(Arc::new(ValidateRequest::new()))
//!     .wrap(Arc::new(AuthInterceptor::new()))
//!     .cleanup(Arc::new(ReleaseConnections::new()));
//!
//! // Share it and execute once per request, after routing picked `handler`.
//! let pipeline = Arc::new(pipeline);
//! let result = pipeline.execute(request, handler).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod chain;
pub mod config;
pub mod context;
pub mod errors;
pub mod events;
pub mod executor;
pub mod middleware;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod stages;
pub mod testing;
pub mod utils;

#[cfg(test)]
mod integration_tests;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::chain::{build_chain, handler_fn, BoxedHandler, HandlerFuture, Next};
    pub use crate::config::{ConfigSnapshot, PipelineConfig};
    pub use crate::context::{
        ActiveContextRegistry, CapturedError, MetadataBag, RequestContext, ScopedBag,
    };
    pub use crate::errors::{MiddlewareError, PipelineError, RegistrationError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::middleware::{
        CleanupHandler, ConditionalInterceptor, ErrorHandler, FnInterceptor, FnTransform,
        Interceptor, Middleware, Transform,
    };
    pub use crate::pipeline::{Pipeline, PipelineStats};
    pub use crate::registry::StageRegistry;
    pub use crate::response::recovery_payload;
    pub use crate::stages::{Stage, StageCounts};
    pub use crate::utils::{generate_request_id, iso_timestamp, Timestamp};
}
