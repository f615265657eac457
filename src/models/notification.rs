//! # Notification Model
//!
//! The outbound message produced for one (event, alarm) pair. Its JSON form is
//! the wire contract consumed downstream:
//! `{"title": ..., "when": <RFC 3339>, "lead": <minutes>, "severity": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{Alarm, Event};
use crate::constants::DEFAULT_SEVERITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,

    /// Event start time
    pub when: DateTime<Utc>,

    /// Minutes between the reminder and the event start
    pub lead: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,
}

impl Notification {
    pub fn new(event: &Event, alarm: &Alarm) -> Self {
        let severity = if alarm.severity.is_empty() {
            DEFAULT_SEVERITY.to_string()
        } else {
            alarm.severity.clone()
        };

        Self {
            title: event.title.clone(),
            when: event.start_time,
            lead: alarm.lead_time_minutes,
            severity,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
