//! # Structured Logging Module
//!
//! Installs the global `tracing` subscriber for the notifier. Output is JSON
//! or human-readable text on stdout; `RUST_LOG` takes precedence over the
//! configured level.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging once per process.
///
/// Later calls are no-ops, and an already installed global subscriber is
/// left in place.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = resolve_log_level(config, &environment);
        let json = config.format.eq_ignore_ascii_case("json");

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let layer = if json {
            fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            level = %log_level,
            format = if json { "json" } else { "text" },
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Current environment from `CALNOTIFY_ENV`, then `APP_ENV`
fn get_environment() -> String {
    std::env::var("CALNOTIFY_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn default_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

fn resolve_log_level(config: &LoggingConfig, environment: &str) -> String {
    if config.debug {
        return "debug".to_string();
    }

    let level = config.level.trim().to_lowercase();
    if level.is_empty() {
        default_log_level(environment).to_string()
    } else {
        level
    }
}
