//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::EngineError;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, or by `default_filter`
/// when `RUST_LOG` is unset or unparsable.
///
/// Returns `Ok(false)` without touching anything if a global subscriber is
/// already installed, so calling this more than once is harmless.
pub fn init_tracing(default_filter: &str) -> Result<bool, EngineError> {
    if tracing::dispatcher::has_been_set() {
        return Ok(false);
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| EngineError::Logging(format!("bad filter {default_filter:?}: {e}")))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| EngineError::Logging(e.to_string()))?;
    Ok(true)
}
