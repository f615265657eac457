//! # Resilience Configuration
//!
//! Configuration structures and validation for retry and circuit breaker
//! behavior. File-level settings in [`crate::config`] convert into these.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_RETRIABLE_PHRASES, DEFAULT_RETRIABLE_STATUSES};

/// Configuration for a [`crate::resilience::Retryer`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt, before the backoff factor is applied
    pub initial_delay: Duration,

    /// Upper bound for any single backoff sleep (before jitter)
    pub max_delay: Duration,

    pub backoff_factor: f64,

    /// Add up to 10% random extra delay to each sleep
    pub jitter: bool,

    /// Case-insensitive phrases that make an unclassified error retriable
    pub retriable_errors: Vec<String>,

    pub retriable_statuses: Vec<u16>,
}

impl RetryConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }

        if self.max_attempts > 20 {
            return Err("max_attempts should not exceed 20".to_string());
        }

        if self.initial_delay > self.max_delay {
            return Err("initial_delay must not exceed max_delay".to_string());
        }

        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err("backoff_factor must be a finite number >= 1.0".to_string());
        }

        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
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

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery
    pub open_timeout: Duration,

    /// Number of successful calls in half-open state to close circuit
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Create configuration for calendar provider fetches
    pub fn for_calendar_provider() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }

    /// Create configuration for the notification publisher
    pub fn for_publisher() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(15),
            success_threshold: 1,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.failure_threshold > 100 {
            return Err("failure_threshold should not exceed 100".to_string());
        }

        if self.open_timeout.is_zero() {
            return Err("open_timeout must be greater than 0".to_string());
        }

        if self.open_timeout > Duration::from_secs(3600) {
            return Err("open_timeout should not exceed 3600 seconds".to_string());
        }

        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }

        if self.success_threshold > 50 {
            return Err("success_threshold should not exceed 50".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}
