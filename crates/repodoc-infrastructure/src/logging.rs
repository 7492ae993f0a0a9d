//! Structured logging setup (`SPEC_FULL.md` §1.1 ambient stack, grounded in
//! the teacher's `logging` module shape: a single `init_logging` entry point
//! plus small named helpers rather than scattered `tracing_subscriber::fmt()`
//! calls at call sites).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber for the process.
///
/// Reads `RUST_LOG` via [`EnvFilter`], defaulting to `info` when unset.
/// `json` selects structured JSON output (for production/container use);
/// otherwise a compact human-readable formatter is used (for local
/// development). Safe to call at most once per process; a second call is a
/// silent no-op via `tracing`'s global-default guard.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let _ = registry.with(fmt::layer().json().with_target(true)).try_init();
    } else {
        let _ = registry.with(fmt::layer().with_target(false).compact()).try_init();
    }
}

/// Emit a single structured line reporting the configuration that was
/// loaded, at startup.
pub fn log_config_loaded(bind_address: &str, queue_capacity: usize, default_provider: &str) {
    tracing::info!(bind_address, queue_capacity, default_provider, "configuration loaded");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(false);
        init_logging(false);
    }
}
