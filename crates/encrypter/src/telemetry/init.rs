//! Tracing subscriber setup and the per-run span.

use anyhow::Result;
use tracing::Span;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Initialise the global JSON tracing subscriber on stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init_telemetry(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise field-encrypter tracing: {e}"))
}

/// Root span for one run, carrying a fresh `run_id`.
pub fn run_span() -> (Span, Uuid) {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("run", run_id = %run_id);
    (span, run_id)
}
