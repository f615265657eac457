//! Mock collaborators: calendar manager, calendar provider and publisher.

use async_trait::async_trait;
use calendar_notifier::calendar::{Calendar, CalendarError, CalendarManager, CalendarProvider};
use calendar_notifier::models::{Event, Notification};
use calendar_notifier::publisher::{PublishError, Publisher};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;

/// Calendar manager returning a fixed, replaceable event list
#[derive(Default)]
pub struct MockCalendarManager {
    events: Mutex<Vec<Event>>,
    fail: AtomicBool,
    calls: AtomicU32,
    closed: AtomicBool,
}

impl MockCalendarManager {
    pub fn with_events(events: Vec<Event>) -> Self {
        let manager = Self::default();
        manager.set_events(events);
        manager
    }

    pub fn set_events(&self, events: Vec<Event>) {
        *self.events.lock() = events;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarManager for MockCalendarManager {
    async fn get_all_events(
        &self,
        _cancel: &CancellationToken,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(CalendarError::provider("mock", "calendar backend unavailable"));
        }
        Ok(self.events.lock().clone())
    }

    async fn close(&self) -> Result<(), CalendarError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider with one calendar whose first `failures` event fetches fail
pub struct MockProvider {
    name: String,
    events: Mutex<Vec<Event>>,
    failures: AtomicU32,
    error: fn() -> CalendarError,
    event_calls: AtomicU32,
    closed: AtomicBool,
}

impl MockProvider {
    pub fn new(name: &str, events: Vec<Event>) -> Self {
        Self {
            name: name.to_string(),
            events: Mutex::new(events),
            failures: AtomicU32::new(0),
            error: || CalendarError::provider("mock", "unexpected failure"),
            event_calls: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn failing(mut self, failures: u32, error: fn() -> CalendarError) -> Self {
        self.failures = AtomicU32::new(failures);
        self.error = error;
        self
    }

    pub fn event_calls(&self) -> u32 {
        self.event_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> &str {
        "mock"
    }

    async fn get_calendars(&self) -> Result<Vec<Calendar>, CalendarError> {
        Ok(vec![Calendar::new("primary", &self.name)])
    }

    async fn get_events(
        &self,
        _calendar_ids: &[String],
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err((self.error)());
        }
        Ok(self.events.lock().clone())
    }

    async fn is_healthy(&self) -> Result<(), CalendarError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), CalendarError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Publisher that records every notification it accepts
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Notification>>,
    fail: AtomicBool,
    closed: AtomicBool,
}

impl RecordingPublisher {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish_notification(&self, notification: &Notification) -> Result<(), PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::NotConnected);
        }
        self.published.lock().push(notification.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
