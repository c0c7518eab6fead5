//! Logging initialisation for binaries and tests embedding the engine.

use tracing_subscriber::EnvFilter;

/// Initialises a global `tracing` subscriber with env-filter support.
///
/// Respects `RUST_LOG`, defaulting to `info`. Safe to call more than once;
/// later calls are no-ops.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
