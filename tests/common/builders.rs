//! Event builders shared by the integration tests.

use calendar_notifier::models::{Alarm, Event};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Fixed reference instant for tests that do not depend on the wall clock
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

/// One-hour event starting `minutes` from now
pub fn upcoming_event(id: &str, title: &str, minutes: i64) -> Event {
    let start = Utc::now() + Duration::minutes(minutes);
    Event::new(id, title, start, start + Duration::hours(1))
}

/// One-hour event on `calendar`, starting `offset_minutes` after the reference time
pub fn calendar_event(id: &str, title: &str, offset_minutes: i64, calendar: &str) -> Event {
    let start = reference_time() + Duration::minutes(offset_minutes);
    Event::new(id, title, start, start + Duration::hours(1)).with_calendar(calendar, calendar)
}

pub fn alarm(lead_time_minutes: u32, method: &str) -> Alarm {
    Alarm::new(lead_time_minutes, method, "normal")
}
