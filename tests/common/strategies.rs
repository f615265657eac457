//! Proptest strategies for calendar events.

use calendar_notifier::models::{Alarm, Event};
use chrono::Duration;
use proptest::prelude::*;

use super::builders::reference_time;

pub fn calendar_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["google", "Outlook", "apple", "caldav", "work", "home"])
        .prop_map(str::to_string)
}

pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "Team Meeting",
        "team meeting",
        "Quarterly planning review",
        "Planning review",
        "Dentist",
        "Lunch with Sam",
        "Sprint demo",
        "Sync",
        "",
    ])
    .prop_map(str::to_string)
}

pub fn alarm_strategy() -> impl Strategy<Value = Alarm> {
    (
        prop::sample::select(vec![0u32, 5, 10, 15, 30, 60]),
        prop::sample::select(vec!["popup", "email"]),
        prop::sample::select(vec!["normal", "high"]),
    )
        .prop_map(|(lead, method, severity)| Alarm::new(lead, method, severity))
}

/// Events within a three-hour span after the reference time
pub fn event_strategy() -> impl Strategy<Value = Event> {
    (
        "[a-f]{1,2}",
        title_strategy(),
        0i64..180,
        calendar_name_strategy(),
        prop::collection::vec(alarm_strategy(), 0..4),
    )
        .prop_map(|(id, title, offset, calendar, alarms)| {
            let start = reference_time() + Duration::minutes(offset);
            Event::new(id, title, start, start + Duration::minutes(30))
                .with_calendar(calendar.clone(), calendar)
                .with_alarms(alarms)
        })
}

pub fn events_strategy(max: usize) -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(event_strategy(), 0..max)
}
