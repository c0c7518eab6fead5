//! Sequential execution of transform stages.

use crate::config::PipelineConfig;
use crate::context::{CapturedError, RequestContext};
use crate::errors::PipelineError;
use crate::middleware::Transform;
use crate::stages::Stage;
use std::sync::Arc;
use tracing::warn;

/// Runs a stage's transforms in order over `payload`.
///
/// Each transform receives the current payload and the request context.
/// Every failure is recorded into the context first; then:
/// - a `Failed` error is swallowed when error recovery is enabled, leaving
///   the payload as it was before the failing transform;
/// - a `Rejected` error, or any error with recovery disabled, stops the
///   stage and propagates.
///
/// The same executor serves both the pre-processing and post-processing
/// stages.
pub async fn run_transforms(
    stage: Stage,
    transforms: &[Arc<dyn Transform>],
    mut payload: serde_json::Value,
    ctx: &RequestContext,
    config: &PipelineConfig,
) -> Result<serde_json::Value, PipelineError> {
    for transform in transforms {
        match transform.apply(payload.clone(), ctx).await {
            Ok(next) => payload = next,
            Err(err) => {
                ctx.record_error(CapturedError::new(
                    Some(stage),
                    Some(transform.name()),
                    err.to_string(),
                ));

                if config.enable_error_recovery && !err.is_rejection() {
                    warn!(
                        stage = %stage,
                        middleware = transform.name(),
                        error = %err,
                        "transform failed; continuing with previous payload"
                    );
                } else {
                    return Err(PipelineError::StageMiddleware {
                        stage,
                        middleware: transform.name().to_string(),
                        source: err,
                    });
                }
            }
        }
    }
    Ok(payload)
}
