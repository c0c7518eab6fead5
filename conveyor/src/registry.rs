//! Ordered, per-stage middleware collections.

use crate::errors::RegistrationError;
use crate::middleware::{CleanupHandler, ErrorHandler, Interceptor, Middleware, Transform};
use crate::stages::{Stage, StageCounts};
use std::fmt;
use std::sync::Arc;

/// Ordered, per-stage collections of middleware.
///
/// Populated once during setup, before concurrent traffic begins. All
/// registration methods take `&mut self`, so the populate-once contract is
/// enforced by the borrow checker: once the owning pipeline is shared behind
/// an `Arc`, no further registration is possible.
#[derive(Default)]
pub struct StageRegistry {
    pre_processing: Vec<Arc<dyn Transform>>,
    request_handling: Vec<Arc<dyn Interceptor>>,
    post_processing: Vec<Arc<dyn Transform>>,
    error_handling: Vec<Arc<dyn ErrorHandler>>,
    cleanup: Vec<Arc<dyn CleanupHandler>>,
}

impl StageRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `middleware` to `stage`'s ordered list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the middleware's shape does not
    /// match the stage's execution model.
    pub fn register(
        &mut self,
        stage: Stage,
        middleware: Middleware,
    ) -> Result<(), RegistrationError> {
        match (stage, middleware) {
            (Stage::PreProcessing, Middleware::Transform(transform)) => {
                self.pre_processing.push(transform);
            }
            (Stage::PostProcessing, Middleware::Transform(transform)) => {
                self.post_processing.push(transform);
            }
            (Stage::RequestHandling, Middleware::Interceptor(interceptor)) => {
                self.request_handling.push(interceptor);
            }
            (Stage::ErrorHandling, Middleware::ErrorHandler(handler)) => {
                self.error_handling.push(handler);
            }
            (Stage::Cleanup, Middleware::Cleanup(handler)) => {
                self.cleanup.push(handler);
            }
            (stage, middleware) => {
                return Err(RegistrationError {
                    stage,
                    shape: middleware.shape(),
                });
            }
        }
        Ok(())
    }

    /// Registers a pre-processing transform.
    pub fn pre_processing(&mut self, transform: Arc<dyn Transform>) -> &mut Self {
        self.pre_processing.push(transform);
        self
    }

    /// Registers an interceptor under the default stage (request handling).
    pub fn wrap(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.request_handling.push(interceptor);
        self
    }

    /// Registers a post-processing transform.
    pub fn post_processing(&mut self, transform: Arc<dyn Transform>) -> &mut Self {
        self.post_processing.push(transform);
        self
    }

    /// Registers an error handler.
    pub fn error_handling(&mut self, handler: Arc<dyn ErrorHandler>) -> &mut Self {
        self.error_handling.push(handler);
        self
    }

    /// Registers a cleanup handler.
    pub fn cleanup(&mut self, handler: Arc<dyn CleanupHandler>) -> &mut Self {
        self.cleanup.push(handler);
        self
    }

    /// The registered pre-processing transforms, in order.
    #[must_use]
    pub fn pre_processing_transforms(&self) -> &[Arc<dyn Transform>] {
        &self.pre_processing
    }

    /// The registered interceptors, in order.
    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.request_handling
    }

    /// The registered post-processing transforms, in order.
    #[must_use]
    pub fn post_processing_transforms(&self) -> &[Arc<dyn Transform>] {
        &self.post_processing
    }

    /// The registered error handlers, in order.
    #[must_use]
    pub fn error_handlers(&self) -> &[Arc<dyn ErrorHandler>] {
        &self.error_handling
    }

    /// The registered cleanup handlers, in order.
    #[must_use]
    pub fn cleanup_handlers(&self) -> &[Arc<dyn CleanupHandler>] {
        &self.cleanup
    }

    /// Per-stage middleware counts.
    #[must_use]
    pub fn counts(&self) -> StageCounts {
        StageCounts {
            pre_processing: self.pre_processing.len(),
            request_handling: self.request_handling.len(),
            post_processing: self.post_processing.len(),
            error_handling: self.error_handling.len(),
            cleanup: self.cleanup.len(),
        }
    }

    /// Returns true if no middleware is registered under any stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }
}

impl fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageRegistry")
            .field("counts", &self.counts())
            .finish()
    }
}
