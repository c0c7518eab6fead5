//! The fixed execution stages a request passes through.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five fixed phases of request processing.
///
/// A middleware registered under one stage is only ever invoked under that
/// stage's execution model: transforms run sequentially, interceptors are
/// composed into the onion chain, error and cleanup handlers run best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Sequential transforms applied to the inbound request.
    PreProcessing,
    /// The nested interceptor chain around the terminal handler.
    RequestHandling,
    /// Sequential transforms applied to the handler's result.
    PostProcessing,
    /// Best-effort handlers invoked on the failure path.
    ErrorHandling,
    /// Best-effort handlers always invoked before the context is released.
    Cleanup,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [
        Self::PreProcessing,
        Self::RequestHandling,
        Self::PostProcessing,
        Self::ErrorHandling,
        Self::Cleanup,
    ];

    /// Returns the stage's snake_case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreProcessing => "pre_processing",
            Self::RequestHandling => "request_handling",
            Self::PostProcessing => "post_processing",
            Self::ErrorHandling => "error_handling",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-stage middleware counts, as reported by introspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    /// Number of pre-processing transforms.
    pub pre_processing: usize,
    /// Number of request-handling interceptors.
    pub request_handling: usize,
    /// Number of post-processing transforms.
    pub post_processing: usize,
    /// Number of error handlers.
    pub error_handling: usize,
    /// Number of cleanup handlers.
    pub cleanup: usize,
}

impl StageCounts {
    /// Total middleware registered across all stages.
    #[must_use]
    pub fn total(&self) -> usize {
        self.pre_processing
            + self.request_handling
            + self.post_processing
            + self.error_handling
            + self.cleanup
    }
}
