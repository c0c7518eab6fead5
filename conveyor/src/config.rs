//! Execution policies for a pipeline instance.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Immutable execution policies for one [`Pipeline`](crate::pipeline::Pipeline).
///
/// Created once at setup time; budgets are expressed in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Whether contexts are registered in the active-context registry.
    pub enable_context_tracking: bool,
    /// Whether middleware failures are contained and recovered.
    pub enable_error_recovery: bool,
    /// Whether per-stage durations are measured and emitted.
    pub enable_performance_monitoring: bool,
    /// Whole-call execution budget in seconds, if any.
    pub max_execution_time: Option<f64>,
    /// Validity window for an active context in seconds, if any.
    pub context_timeout: Option<f64>,
    /// Free-form configuration metadata.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_context_tracking: true,
            enable_error_recovery: true,
            enable_performance_monitoring: false,
            max_execution_time: Some(30.0),
            context_timeout: Some(300.0),
            metadata: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Creates a configuration with default policies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether contexts are tracked in the active-context registry.
    #[must_use]
    pub fn with_context_tracking(mut self, enabled: bool) -> Self {
        self.enable_context_tracking = enabled;
        self
    }

    /// Sets whether middleware failures are contained and recovered.
    #[must_use]
    pub fn with_error_recovery(mut self, enabled: bool) -> Self {
        self.enable_error_recovery = enabled;
        self
    }

    /// Sets whether per-stage durations are measured and emitted.
    #[must_use]
    pub fn with_performance_monitoring(mut self, enabled: bool) -> Self {
        self.enable_performance_monitoring = enabled;
        self
    }

    /// Sets the whole-call execution budget in seconds.
    #[must_use]
    pub fn with_max_execution_time(mut self, seconds: f64) -> Self {
        self.max_execution_time = Some(seconds);
        self
    }

    /// Removes the whole-call execution budget.
    #[must_use]
    pub fn without_max_execution_time(mut self) -> Self {
        self.max_execution_time = None;
        self
    }

    /// Sets the context validity window in seconds.
    #[must_use]
    pub fn with_context_timeout(mut self, seconds: f64) -> Self {
        self.context_timeout = Some(seconds);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The whole-call budget as a [`Duration`], if configured.
    #[must_use]
    pub fn execution_budget(&self) -> Option<Duration> {
        self.max_execution_time.map(Duration::from_secs_f64)
    }

    /// The context validity window as a [`Duration`], if configured.
    #[must_use]
    pub fn context_window(&self) -> Option<Duration> {
        self.context_timeout.map(Duration::from_secs_f64)
    }

    /// Snapshot of flags and budgets for introspection.
    #[must_use]
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            enable_context_tracking: self.enable_context_tracking,
            enable_error_recovery: self.enable_error_recovery,
            enable_performance_monitoring: self.enable_performance_monitoring,
            max_execution_time: self.max_execution_time,
            context_timeout: self.context_timeout,
        }
    }
}

/// Read-only snapshot of configuration flags and budgets.
///
/// Registration metadata is excluded; this is what introspection reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Whether contexts are tracked in the active-context registry.
    pub enable_context_tracking: bool,
    /// Whether middleware failures are contained and recovered.
    pub enable_error_recovery: bool,
    /// Whether per-stage durations are measured and emitted.
    pub enable_performance_monitoring: bool,
    /// Whole-call execution budget in seconds, if any.
    pub max_execution_time: Option<f64>,
    /// Validity window for an active context in seconds, if any.
    pub context_timeout: Option<f64>,
}
