//! # Notifier Configuration
//!
//! File-based configuration for the calendar notifier. A single YAML, TOML or
//! JSON document describes the publisher target, the calendars to poll and the
//! tuning of every component; environment variables override individual keys.
//!
//! ## Layout
//!
//! ```yaml
//! publisher:
//!   url: "nats://localhost:4222"
//!   subject: "calendar.notifications"
//! calendars:
//!   - name: work
//!     type: caldav
//!     url: "https://caldav.example.com/dav"
//!     username: me
//!     password: secret
//! defaults:
//!   notification_intervals: [15, 5]
//!   default_severity: normal
//! logging:
//!   level: info
//!   format: json
//! ```
//!
//! The `scheduler`, `coordinator`, `retry` and `circuit_breaker` sections are
//! optional. Durations are written as unit-suffixed integers
//! (`poll_interval_seconds`, `initial_delay_ms`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use calendar_notifier::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/notifier.yaml")?;
//! let scheduler_config = manager.config().to_scheduler_config()?;
//! println!("polling every {:?}", scheduler_config.poll_interval);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::calendar::{CoordinatorConfig, MergeStrategy};
use crate::constants::{
    provider_types, DEFAULT_RETRIABLE_PHRASES, DEFAULT_RETRIABLE_STATUSES, DEFAULT_SEVERITY,
};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::scheduler::SchedulerConfig;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Poll interval applied to calendars that do not set one
pub const DEFAULT_CALENDAR_POLL_INTERVAL_SECONDS: u64 = 300;

/// Root configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub publisher: PublisherConfig,
    pub calendars: Vec<CalendarConfig>,
    pub defaults: DefaultsConfig,
    pub logging: LoggingConfig,
    pub scheduler: SchedulerSettings,
    pub coordinator: CoordinatorSettings,
    pub retry: RetrySettings,
    pub circuit_breaker: CircuitBreakerSettings,
}

/// Where notifications are published
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub url: String,
    pub subject: String,
}

/// One calendar source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub name: String,

    /// Provider type: `caldav`, `ical` or `google`
    #[serde(rename = "type")]
    pub provider_type: String,

    pub calendar_ids: Vec<String>,
    pub poll_interval_seconds: u64,

    pub url: String,
    pub username: String,
    pub password: String,

    /// Path to, or inline contents of, provider credentials
    pub credentials: String,
}

impl CalendarConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    fn validate(&self, index: usize) -> ConfigResult<()> {
        let context = format!("calendars[{index}]");

        if self.name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("name", context));
        }
        if self.provider_type.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("type", context));
        }

        let require = |field: &str, value: &str| {
            if value.trim().is_empty() {
                Err(ConfigurationError::missing_required_field(
                    field,
                    format!("{context} ({})", self.provider_type),
                ))
            } else {
                Ok(())
            }
        };

        match self.provider_type.as_str() {
            provider_types::CALDAV => {
                require("url", &self.url)?;
                require("username", &self.username)?;
                require("password", &self.password)?;
            }
            provider_types::ICAL => require("url", &self.url)?,
            provider_types::GOOGLE => require("credentials", &self.credentials)?,
            other => {
                return Err(ConfigurationError::invalid_value(
                    format!("{context}.type"),
                    other,
                    format!(
                        "unsupported calendar type, expected one of {}",
                        provider_types::ALL.join(", ")
                    ),
                ));
            }
        }

        Ok(())
    }
}

/// Defaults applied to events that carry no alarms of their own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Lead times in minutes
    pub notification_intervals: Vec<u32>,
    pub default_severity: String,
    pub final_reminder_minutes: Option<u32>,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            notification_intervals: vec![15, 5],
            default_severity: String::new(),
            final_reminder_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `debug`, `info`, `warn` or `error`; empty means environment default
    pub level: String,

    /// `json` or `text`
    pub format: String,

    /// Forces debug level regardless of `level`
    pub debug: bool,
}

impl LoggingConfig {
    pub const LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];
    pub const FORMATS: &'static [&'static str] = &["json", "text"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub poll_interval_seconds: u64,
    pub lookahead_window_seconds: u64,
    pub max_concurrent_events: usize,
    pub timer_buffer_size: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            poll_interval_seconds: defaults.poll_interval.as_secs(),
            lookahead_window_seconds: defaults.lookahead_window.as_secs(),
            max_concurrent_events: defaults.max_concurrent_events,
            timer_buffer_size: defaults.timer_buffer_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    pub deduplication_enabled: bool,
    pub deduplication_window_seconds: u64,
    pub provider_priorities: HashMap<String, i32>,
    pub merge_strategies: HashMap<String, MergeStrategy>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            deduplication_enabled: defaults.deduplication_enabled,
            deduplication_window_seconds: defaults.deduplication_window.as_secs(),
            provider_priorities: defaults.provider_priorities,
            merge_strategies: defaults.merge_strategies,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub jitter: bool,
    pub retriable_errors: Vec<String>,
    pub retriable_statuses: Vec<u16>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            jitter: true,
            retriable_errors: DEFAULT_RETRIABLE_PHRASES
                .iter()
                .map(|phrase| phrase.to_string())
                .collect(),
            retriable_statuses: DEFAULT_RETRIABLE_STATUSES.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout_seconds: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            open_timeout_seconds: defaults.open_timeout.as_secs(),
            success_threshold: defaults.success_threshold,
        }
    }
}

impl NotifierConfig {
    /// Fill in values the file may leave empty
    pub fn apply_defaults(&mut self) {
        for calendar in &mut self.calendars {
            if calendar.poll_interval_seconds == 0 {
                calendar.poll_interval_seconds = DEFAULT_CALENDAR_POLL_INTERVAL_SECONDS;
            }
        }

        if self.defaults.default_severity.trim().is_empty() {
            self.defaults.default_severity = DEFAULT_SEVERITY.to_string();
        }

        if self.logging.level.trim().is_empty() {
            self.logging.level = "info".to_string();
        }
        if self.logging.format.trim().is_empty() {
            self.logging.format = "json".to_string();
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.publisher.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("url", "publisher"));
        }
        if self.publisher.subject.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "subject",
                "publisher",
            ));
        }

        if self.calendars.is_empty() {
            return Err(ConfigurationError::validation_error(
                "at least one calendar must be configured",
            ));
        }

        for (index, calendar) in self.calendars.iter().enumerate() {
            calendar.validate(index)?;
        }

        let level = self.logging.level.to_lowercase();
        if !level.is_empty() && !LoggingConfig::LEVELS.contains(&level.as_str()) {
            return Err(ConfigurationError::invalid_value(
                "logging.level",
                &self.logging.level,
                format!("expected one of {}", LoggingConfig::LEVELS.join(", ")),
            ));
        }

        let format = self.logging.format.to_lowercase();
        if !format.is_empty() && !LoggingConfig::FORMATS.contains(&format.as_str()) {
            return Err(ConfigurationError::invalid_value(
                "logging.format",
                &self.logging.format,
                format!("expected one of {}", LoggingConfig::FORMATS.join(", ")),
            ));
        }

        self.to_scheduler_config()?;
        self.to_coordinator_config()?;
        self.to_retry_config()?;
        self.to_circuit_breaker_config()?;

        Ok(())
    }

    pub fn to_scheduler_config(&self) -> ConfigResult<SchedulerConfig> {
        let severity = if self.defaults.default_severity.trim().is_empty() {
            DEFAULT_SEVERITY.to_string()
        } else {
            self.defaults.default_severity.clone()
        };

        let config = SchedulerConfig {
            poll_interval: Duration::from_secs(self.scheduler.poll_interval_seconds),
            lookahead_window: Duration::from_secs(self.scheduler.lookahead_window_seconds),
            default_lead_times: self.defaults.notification_intervals.clone(),
            final_reminder_minutes: self.defaults.final_reminder_minutes,
            default_severity: severity,
            max_concurrent_events: self.scheduler.max_concurrent_events,
            timer_buffer_size: self.scheduler.timer_buffer_size,
        };

        config
            .validate()
            .map_err(|e| ConfigurationError::validation_error(format!("scheduler: {e}")))?;
        Ok(config)
    }

    /// Provider priority keys are lower-cased since calendar names are
    /// matched case-insensitively
    pub fn to_coordinator_config(&self) -> ConfigResult<CoordinatorConfig> {
        let config = CoordinatorConfig {
            deduplication_enabled: self.coordinator.deduplication_enabled,
            deduplication_window: Duration::from_secs(
                self.coordinator.deduplication_window_seconds,
            ),
            provider_priorities: self
                .coordinator
                .provider_priorities
                .iter()
                .map(|(name, rank)| (name.to_lowercase(), *rank))
                .collect(),
            merge_strategies: self.coordinator.merge_strategies.clone(),
        };

        config
            .validate()
            .map_err(|e| ConfigurationError::validation_error(format!("coordinator: {e}")))?;
        Ok(config)
    }

    pub fn to_retry_config(&self) -> ConfigResult<RetryConfig> {
        let retry = &self.retry;
        let config = RetryConfig {
            max_attempts: retry.max_attempts,
            initial_delay: Duration::from_millis(retry.initial_delay_ms),
            max_delay: Duration::from_millis(retry.max_delay_ms),
            backoff_factor: retry.backoff_factor,
            jitter: retry.jitter,
            retriable_errors: retry.retriable_errors.clone(),
            retriable_statuses: retry.retriable_statuses.clone(),
        };

        config
            .validate()
            .map_err(|e| ConfigurationError::validation_error(format!("retry: {e}")))?;
        Ok(config)
    }

    pub fn to_circuit_breaker_config(&self) -> ConfigResult<CircuitBreakerConfig> {
        let config = CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker.failure_threshold,
            open_timeout: Duration::from_secs(self.circuit_breaker.open_timeout_seconds),
            success_threshold: self.circuit_breaker.success_threshold,
        };

        config.validate().map_err(|e| {
            ConfigurationError::validation_error(format!("circuit_breaker: {e}"))
        })?;
        Ok(config)
    }
}
