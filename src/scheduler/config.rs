//! Scheduler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::DEFAULT_SEVERITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time between two calendar polls
    pub poll_interval: Duration,

    /// How far ahead of now each poll looks for events
    pub lookahead_window: Duration,

    /// Reminder lead times (minutes) for events without alarms of their own
    pub default_lead_times: Vec<u32>,

    /// Extra reminder added to every event unless an alarm already has this lead
    pub final_reminder_minutes: Option<u32>,

    /// Severity given to synthesized default and final reminders
    pub default_severity: String,

    /// Upper bound on tracked events; new events beyond it are dropped
    pub max_concurrent_events: usize,

    /// Capacity of the ingest and fire queues
    pub timer_buffer_size: usize,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than 0".to_string());
        }

        if self.lookahead_window.is_zero() {
            return Err("lookahead_window must be greater than 0".to_string());
        }

        if self.lookahead_window < self.poll_interval {
            return Err("lookahead_window must be at least poll_interval".to_string());
        }

        if self.default_severity.trim().is_empty() {
            return Err("default_severity must not be empty".to_string());
        }

        if self.max_concurrent_events == 0 {
            return Err("max_concurrent_events must be greater than 0".to_string());
        }

        if self.timer_buffer_size == 0 {
            return Err("timer_buffer_size must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5 * 60),
            lookahead_window: Duration::from_secs(24 * 60 * 60),
            default_lead_times: vec![15, 5],
            final_reminder_minutes: None,
            default_severity: DEFAULT_SEVERITY.to_string(),
            max_concurrent_events: 1000,
            timer_buffer_size: 100,
        }
    }
}
