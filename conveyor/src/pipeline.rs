//! The pipeline orchestrator.
//!
//! `Pipeline::execute` drives one request through the full stage sequence:
//! context creation and registration, pre-processing, chain dispatch,
//! post-processing, the failure path, and the unconditional cleanup phase.

use crate::chain::{build_chain, BoxedHandler};
use crate::config::{ConfigSnapshot, PipelineConfig};
use crate::context::{ActiveContextRegistry, CapturedError, RequestContext};
use crate::errors::{PipelineError, RegistrationError};
use crate::events::{EventSink, NoOpEventSink};
use crate::executor::run_transforms;
use crate::middleware::{CleanupHandler, ErrorHandler, Interceptor, Middleware, Transform};
use crate::registry::StageRegistry;
use crate::response::recovery_payload;
use crate::stages::{Stage, StageCounts};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Read-only statistics over a pipeline instance.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Number of requests currently in flight.
    pub active_contexts: usize,
    /// Per-stage middleware counts.
    pub stage_counts: StageCounts,
    /// Configuration flags and budgets.
    pub config: ConfigSnapshot,
}

/// The middleware pipeline execution engine.
///
/// Register middleware during setup, share the pipeline (typically behind an
/// `Arc`), and call [`execute`](Self::execute) once per inbound request after
/// routing has selected the terminal handler. Stages within one call run
/// strictly sequentially; concurrent calls are independent except for the
/// active-context registry.
pub struct Pipeline {
    config: PipelineConfig,
    registry: StageRegistry,
    contexts: ActiveContextRegistry,
    events: Arc<dyn EventSink>,
}

impl Pipeline {
    /// Creates a pipeline with the given configuration and no middleware.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            registry: StageRegistry::new(),
            contexts: ActiveContextRegistry::new(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// The pipeline's configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Read access to the stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Mutable access to the stage registry for setup-time registration.
    pub fn registry_mut(&mut self) -> &mut StageRegistry {
        &mut self.registry
    }

    /// The active-context registry, for observability tooling.
    #[must_use]
    pub fn active_contexts(&self) -> &ActiveContextRegistry {
        &self.contexts
    }

    /// Appends `middleware` to `stage`'s ordered list.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError`] when the middleware's shape does not
    /// match the stage.
    pub fn register(
        &mut self,
        stage: Stage,
        middleware: Middleware,
    ) -> Result<(), RegistrationError> {
        self.registry.register(stage, middleware)
    }

    /// Registers a pre-processing transform.
    pub fn pre_processing(&mut self, transform: Arc<dyn Transform>) -> &mut Self {
        self.registry.pre_processing(transform);
        self
    }

    /// Registers an interceptor under the default stage (request handling).
    pub fn wrap(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.registry.wrap(interceptor);
        self
    }

    /// Registers a post-processing transform.
    pub fn post_processing(&mut self, transform: Arc<dyn Transform>) -> &mut Self {
        self.registry.post_processing(transform);
        self
    }

    /// Registers an error handler.
    pub fn error_handling(&mut self, handler: Arc<dyn ErrorHandler>) -> &mut Self {
        self.registry.error_handling(handler);
        self
    }

    /// Registers a cleanup handler.
    pub fn cleanup(&mut self, handler: Arc<dyn CleanupHandler>) -> &mut Self {
        self.registry.cleanup(handler);
        self
    }

    /// Executes one request through every stage.
    ///
    /// Pre-processing transforms shape the request, the interceptor chain
    /// dispatches it to `handler`, and post-processing transforms shape the
    /// result. On failure the error-handling phase runs; with error recovery
    /// enabled the generic recovery payload is returned, otherwise the
    /// failure is re-raised. The cleanup phase and context deregistration
    /// happen unconditionally on every path.
    ///
    /// # Errors
    ///
    /// Returns the propagated [`PipelineError`] when error recovery is
    /// disabled and a stage, the chain, or the execution budget failed.
    pub async fn execute(
        &self,
        request: serde_json::Value,
        handler: BoxedHandler,
    ) -> Result<serde_json::Value, PipelineError> {
        let ctx = Arc::new(RequestContext::new(request.clone()));
        if self.config.enable_context_tracking {
            self.contexts.insert(Arc::clone(&ctx));
        }
        self.events.try_emit(
            "pipeline.started",
            Some(serde_json::json!({"request_id": ctx.request_id().to_string()})),
        );

        let outcome = match self.config.execution_budget() {
            Some(budget) => {
                match tokio::time::timeout(budget, self.run_stages(&ctx, request, handler)).await {
                    Ok(result) => result,
                    Err(_) => {
                        let error = PipelineError::Timeout {
                            budget_ms: budget.as_millis() as u64,
                        };
                        ctx.record_error(CapturedError::new(None, None, error.to_string()));
                        Err(error)
                    }
                }
            }
            None => self.run_stages(&ctx, request, handler).await,
        };

        let result = match outcome {
            Ok(value) => {
                self.events.try_emit(
                    "pipeline.completed",
                    Some(serde_json::json!({"request_id": ctx.request_id().to_string()})),
                );
                Ok(value)
            }
            Err(error) => {
                self.run_error_handlers(&ctx, &error).await;
                if self.config.enable_error_recovery {
                    self.events.try_emit(
                        "pipeline.recovered",
                        Some(serde_json::json!({
                            "request_id": ctx.request_id().to_string(),
                            "error": error.kind(),
                        })),
                    );
                    Ok(recovery_payload(&error, &ctx))
                } else {
                    self.events.try_emit(
                        "pipeline.failed",
                        Some(serde_json::json!({
                            "request_id": ctx.request_id().to_string(),
                            "error": error.kind(),
                        })),
                    );
                    Err(error)
                }
            }
        };

        self.run_cleanup(&ctx).await;
        self.contexts.remove(ctx.request_id());

        result
    }

    /// Read-only statistics: active contexts, per-stage counts, config snapshot.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            active_contexts: self.contexts.len(),
            stage_counts: self.registry.counts(),
            config: self.config.snapshot(),
        }
    }

    /// Drops active contexts older than the configured `context_timeout`.
    ///
    /// Returns how many were removed. No-op when no window is configured.
    pub fn purge_stale_contexts(&self) -> usize {
        match self.config.context_window() {
            Some(window) => self.contexts.purge_stale(window),
            None => 0,
        }
    }

    async fn run_stages(
        &self,
        ctx: &Arc<RequestContext>,
        request: serde_json::Value,
        handler: BoxedHandler,
    ) -> Result<serde_json::Value, PipelineError> {
        let stage_start = Instant::now();
        let request = run_transforms(
            Stage::PreProcessing,
            self.registry.pre_processing_transforms(),
            request,
            ctx,
            &self.config,
        )
        .await?;
        self.record_stage_duration(Stage::PreProcessing, stage_start, ctx);

        let stage_start = Instant::now();
        let chain = build_chain(self.registry.interceptors(), handler);
        let result = match (chain.as_ref())(request).await {
            Ok(value) => value,
            Err(source) => {
                let error = PipelineError::HandlerChain { source };
                ctx.record_error(CapturedError::new(
                    Some(Stage::RequestHandling),
                    None,
                    error.to_string(),
                ));
                return Err(error);
            }
        };
        self.record_stage_duration(Stage::RequestHandling, stage_start, ctx);

        let stage_start = Instant::now();
        let result = run_transforms(
            Stage::PostProcessing,
            self.registry.post_processing_transforms(),
            result,
            ctx,
            &self.config,
        )
        .await?;
        self.record_stage_duration(Stage::PostProcessing, stage_start, ctx);

        Ok(result)
    }

    async fn run_error_handlers(&self, ctx: &RequestContext, error: &PipelineError) {
        for handler in self.registry.error_handlers() {
            if let Err(cause) = handler.on_error(error, ctx).await {
                let failure = PipelineError::ErrorHandlerFailure {
                    handler: handler.name().to_string(),
                    message: cause.to_string(),
                };
                warn!(
                    request_id = %ctx.request_id(),
                    handler = handler.name(),
                    "{failure}; continuing with remaining handlers"
                );
                self.events.try_emit(
                    "pipeline.error_handler_failed",
                    Some(serde_json::json!({
                        "request_id": ctx.request_id().to_string(),
                        "handler": handler.name(),
                    })),
                );
            }
        }
    }

    async fn run_cleanup(&self, ctx: &RequestContext) {
        for handler in self.registry.cleanup_handlers() {
            if let Err(cause) = handler.cleanup(ctx).await {
                let failure = PipelineError::CleanupFailure {
                    handler: handler.name().to_string(),
                    message: cause.to_string(),
                };
                warn!(
                    request_id = %ctx.request_id(),
                    handler = handler.name(),
                    "{failure}; continuing with remaining handlers"
                );
                self.events.try_emit(
                    "pipeline.cleanup_failed",
                    Some(serde_json::json!({
                        "request_id": ctx.request_id().to_string(),
                        "handler": handler.name(),
                    })),
                );
            }
        }
    }

    fn record_stage_duration(&self, stage: Stage, start: Instant, ctx: &RequestContext) {
        if !self.config.enable_performance_monitoring {
            return;
        }
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            request_id = %ctx.request_id(),
            stage = %stage,
            duration_ms,
            "stage completed"
        );
        self.events.try_emit(
            "stage.completed",
            Some(serde_json::json!({
                "request_id": ctx.request_id().to_string(),
                "stage": stage.as_str(),
                "duration_ms": duration_ms,
            })),
        );
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("stage_counts", &self.registry.counts())
            .field("active_contexts", &self.contexts.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::handler_fn;

    fn echo_handler() -> BoxedHandler {
        handler_fn(|request| async move { Ok(request) })
    }

    #[tokio::test]
    async fn test_execute_with_no_middleware_returns_handler_result() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        let result = pipeline
            .execute(serde_json::json!({"method": "GET"}), echo_handler())
            .await
            .unwrap();

        assert_eq!(result, serde_json::json!({"method": "GET"}));
        assert_eq!(pipeline.stats().active_contexts, 0);
    }

    #[tokio::test]
    async fn test_stats_reflect_registrations() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        assert_eq!(pipeline.stats().stage_counts.total(), 0);

        pipeline.cleanup(Arc::new(crate::testing::CountingCleanup::new(
            "release",
            Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        )));

        let stats = pipeline.stats();
        assert_eq!(stats.stage_counts.cleanup, 1);
        assert!(stats.config.enable_error_recovery);
    }

    #[tokio::test]
    async fn test_stats_serialize() {
        let pipeline = Pipeline::new(PipelineConfig::default());
        let json = serde_json::to_value(pipeline.stats()).unwrap();
        assert_eq!(json["active_contexts"], 0);
        assert_eq!(json["stage_counts"]["request_handling"], 0);
    }

    #[tokio::test]
    async fn test_purge_without_window_is_noop() {
        let pipeline = Pipeline::new(PipelineConfig {
            context_timeout: None,
            ..PipelineConfig::default()
        });
        assert_eq!(pipeline.purge_stale_contexts(), 0);
    }
}
