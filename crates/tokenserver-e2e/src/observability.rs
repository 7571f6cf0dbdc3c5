//! Log output for a suite run.
//!
//! The configured `logging.level` applies to the harness and its clients.
//! HTTP plumbing underneath reqwest stays at `info` so a `debug` run shows
//! FxA and tokenserver traffic rather than connection-pool chatter.
//! `RUST_LOG`, when set, replaces the whole filter.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Directives appended to the configured level.
pub const QUIET_DEPENDENCIES: &str = "hyper_util=info,h2=info,rustls=info";

/// Builds the filter for `logging`, letting `rust_log` override it.
///
/// An unparsable `RUST_LOG` falls back to the configured level.
#[must_use]
pub fn env_filter(logging: &LoggingConfig, rust_log: Option<&str>) -> EnvFilter {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty())
        && let Ok(filter) = EnvFilter::try_new(directives)
    {
        return filter;
    }
    let level = logging.level.to_ascii_lowercase();
    EnvFilter::try_new(format!("{level},{QUIET_DEPENDENCIES}"))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber. Later calls are no-ops, so tests may call
/// this freely.
pub fn init_tracing(logging: &LoggingConfig) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let _ = tracing_subscriber::registry()
        .with(env_filter(logging, rust_log.as_deref()))
        .with(fmt::layer().with_target(false))
        .try_init();
}
