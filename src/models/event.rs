//! # Calendar Event Model
//!
//! Provider-neutral representation of a calendar event and its alarms. Every
//! calendar source converts into [`Event`] before the coordinator and the
//! scheduler see it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::constants::{DEFAULT_ALARM_METHOD, DEFAULT_SEVERITY};

/// Attendee response recorded by the source calendar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "declined")]
    Declined,
    #[serde(rename = "tentative")]
    Tentative,
    #[serde(rename = "needsAction")]
    NeedsAction,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Accepted => "accepted",
            ResponseStatus::Declined => "declined",
            ResponseStatus::Tentative => "tentative",
            ResponseStatus::NeedsAction => "needsAction",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Empty strings mean "no response information", which is not an error
fn deserialize_response_status<'de, D>(deserializer: D) -> Result<Option<ResponseStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: Option<String> = Option::deserialize(deserializer)?;
    match value.as_deref() {
        None | Some("") => Ok(None),
        Some("accepted") => Ok(Some(ResponseStatus::Accepted)),
        Some("declined") => Ok(Some(ResponseStatus::Declined)),
        Some("tentative") => Ok(Some(ResponseStatus::Tentative)),
        Some("needsAction") => Ok(Some(ResponseStatus::NeedsAction)),
        Some(other) => Err(D::Error::custom(format!(
            "unknown response status '{other}'"
        ))),
    }
}

/// A notification trigger attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alarm {
    /// Minutes before the event start at which the reminder fires
    pub lead_time_minutes: u32,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub severity: String,

    /// Delivery hint from the source (email, popup, ...)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
}

impl Alarm {
    pub fn new(lead_time_minutes: u32, method: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            lead_time_minutes,
            method: method.into(),
            severity: severity.into(),
        }
    }

    /// Synthesized alarm used for configured default and final reminders
    pub fn popup(lead_time_minutes: u32) -> Self {
        Self::new(lead_time_minutes, DEFAULT_ALARM_METHOD, DEFAULT_SEVERITY)
    }

    pub fn lead_time(&self) -> Duration {
        Duration::minutes(i64::from(self.lead_time_minutes))
    }
}

/// A calendar event with everything needed to schedule reminders for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<Alarm>,

    pub calendar_id: String,
    pub calendar_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,

    #[serde(
        default,
        deserialize_with = "deserialize_response_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub response_status: Option<ResponseStatus>,
}

impl Event {
    /// Create an event with the mandatory fields; timestamps default to now
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            start_time,
            end_time,
            alarms: Vec::new(),
            calendar_id: String::new(),
            calendar_name: String::new(),
            location: String::new(),
            created_at: now,
            modified_at: now,
            response_status: None,
        }
    }

    pub fn with_calendar(mut self, calendar_id: impl Into<String>, calendar_name: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self.calendar_name = calendar_name.into();
        self
    }

    pub fn with_alarm(mut self, alarm: Alarm) -> Self {
        self.alarms.push(alarm);
        self
    }

    pub fn with_alarms(mut self, alarms: Vec<Alarm>) -> Self {
        self.alarms = alarms;
        self
    }

    pub fn with_response_status(mut self, status: ResponseStatus) -> Self {
        self.response_status = Some(status);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_modified_at(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = modified_at;
        self
    }

    pub fn has_alarms(&self) -> bool {
        !self.alarms.is_empty()
    }

    /// True if the event starts strictly after `now`
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.start_time > now
    }

    /// Missing response information counts as accepted, which covers
    /// calendars without attendee tracking and events the user organizes.
    pub fn is_accepted(&self) -> bool {
        match self.response_status {
            None => true,
            Some(status) => status == ResponseStatus::Accepted,
        }
    }

    /// Moment at which `alarm` should fire for this event
    pub fn trigger_time(&self, alarm: &Alarm) -> DateTime<Utc> {
        self.start_time - alarm.lead_time()
    }

    /// True once the alarm's trigger moment is reached for an upcoming event
    pub fn should_notify(&self, alarm: &Alarm, now: DateTime<Utc>) -> bool {
        if !self.is_upcoming(now) {
            return false;
        }
        now >= self.trigger_time(alarm)
    }
}
