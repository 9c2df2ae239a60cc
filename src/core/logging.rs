//! Logging configuration and initialization
//!
//! This module sets up the tracing subscriber for structured logging
//! throughout the pipeline.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system with the specified level
///
/// Sets up tracing with a filter based on the provided log level. RUST_LOG
/// takes precedence when set; an unrecognised level falls back to "info".
pub fn init_logging(log_level: &str) {
    let level = log_level
        .split_whitespace()
        .next()
        .unwrap_or("info")
        .to_lowercase();

    let final_level = match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => level.as_str(),
        "warning" => "warn",
        _ => "info",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(final_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
