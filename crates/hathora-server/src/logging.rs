//! Tracing subscriber setup for server binaries.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used
/// (e.g. `"info,hathora_resolver=debug"`). Fails if a global subscriber
/// is already installed.
pub fn init_logging(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init()?;
    tracing::debug!(default_filter, "logging initialized");
    Ok(())
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}
