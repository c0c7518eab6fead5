//! Construction of the generic recovery payload.

use crate::context::RequestContext;
use crate::errors::PipelineError;
use crate::utils::iso_timestamp;

/// Builds the generic, safe payload returned when error recovery is enabled.
///
/// Carries the error kind, a fixed message that leaks no internals, the
/// request ID, and a timestamp. Callers that need the underlying detail
/// should consult the context's captured errors instead.
#[must_use]
pub fn recovery_payload(error: &PipelineError, ctx: &RequestContext) -> serde_json::Value {
    serde_json::json!({
        "error": error.kind(),
        "message": "The request could not be processed.",
        "request_id": ctx.request_id().to_string(),
        "timestamp": iso_timestamp(),
    })
}
