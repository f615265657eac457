//! # Event Scheduler
//!
//! Turns the coordinated event timeline into individually timed reminders.
//!
//! ## Workers
//!
//! `start()` spawns three tasks sharing one cancellation token:
//!
//! - **poll**: fetches `[now, now + lookahead]` from the calendar manager once
//!   immediately and then every poll interval, feeding events into the
//!   bounded ingest queue
//! - **ingest**: (re)schedules every received event
//! - **dispatch**: publishes the notification of every fired timer and marks
//!   it sent
//!
//! Both queues are bounded; producers never wait and drop with a warning
//! when a queue is full.
//!
//! ## State
//!
//! Tracked events live in one map behind a read-write lock. The lock is never
//! held across an await point. Every reminder owns a timer task that is
//! aborted when the event is rescheduled, cleaned up or the scheduler stops.

pub mod config;
pub mod timer;
pub mod types;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::calendar::CalendarManager;
use crate::constants::{DEFAULT_ALARM_METHOD, EVENT_RETENTION};
use crate::error::{NotifierError, Result};
use crate::models::{Alarm, Event, Notification};
use crate::publisher::Publisher;

pub use config::SchedulerConfig;
pub use timer::TimerHandle;
pub use types::{FireEvent, PendingNotification, ScheduledEvent, SchedulerStats};

/// Live reminder: the public record plus its timer
#[derive(Debug)]
struct ArmedNotification {
    record: PendingNotification,
    timer: Option<TimerHandle>,
}

impl ArmedNotification {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

#[derive(Debug)]
struct TrackedEvent {
    event: Event,
    notifications: Vec<ArmedNotification>,
    last_updated: DateTime<Utc>,
}

impl TrackedEvent {
    fn disarm_all(&mut self) {
        for armed in &mut self.notifications {
            armed.disarm();
        }
    }

    fn snapshot(&self) -> ScheduledEvent {
        ScheduledEvent {
            event: self.event.clone(),
            notifications: self
                .notifications
                .iter()
                .map(|armed| armed.record.clone())
                .collect(),
            last_updated: self.last_updated,
        }
    }
}

/// State shared between the scheduler handle and its workers
struct SchedulerCore {
    id: Uuid,
    config: SchedulerConfig,
    calendar_manager: Arc<dyn CalendarManager>,
    publisher: Arc<dyn Publisher>,
    events: RwLock<HashMap<String, TrackedEvent>>,
    ingest_tx: mpsc::Sender<Event>,
    fire_tx: mpsc::Sender<FireEvent>,
    running: AtomicBool,
}

struct Workers {
    cancel: CancellationToken,
    poll: JoinHandle<()>,
    ingest: JoinHandle<mpsc::Receiver<Event>>,
    dispatch: JoinHandle<mpsc::Receiver<FireEvent>>,
}

pub struct EventScheduler {
    core: Arc<SchedulerCore>,
    ingest_rx: Mutex<Option<mpsc::Receiver<Event>>>,
    fire_rx: Mutex<Option<mpsc::Receiver<FireEvent>>>,
    workers: tokio::sync::Mutex<Option<Workers>>,
}

impl std::fmt::Debug for EventScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventScheduler")
            .field("id", &self.core.id)
            .field("config", &self.core.config)
            .field("running", &self.is_running())
            .finish()
    }
}

impl EventScheduler {
    pub fn new(
        config: SchedulerConfig,
        calendar_manager: Arc<dyn CalendarManager>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let buffer = config.timer_buffer_size.max(1);
        let (ingest_tx, ingest_rx) = mpsc::channel(buffer);
        let (fire_tx, fire_rx) = mpsc::channel(buffer);

        Self {
            core: Arc::new(SchedulerCore {
                id: Uuid::new_v4(),
                config,
                calendar_manager,
                publisher,
                events: RwLock::new(HashMap::new()),
                ingest_tx,
                fire_tx,
                running: AtomicBool::new(false),
            }),
            ingest_rx: Mutex::new(Some(ingest_rx)),
            fire_rx: Mutex::new(Some(fire_rx)),
            workers: tokio::sync::Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.core.id
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.core.config
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// Spawn the poll, ingest and dispatch workers
    #[instrument(skip(self), fields(scheduler_id = %self.core.id))]
    pub async fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock().await;
        if workers.is_some() {
            return Err(NotifierError::InvalidState(
                "scheduler is already running".to_string(),
            ));
        }

        self.core
            .config
            .validate()
            .map_err(NotifierError::ConfigurationError)?;

        let ingest_rx = self.ingest_rx.lock().take();
        let fire_rx = self.fire_rx.lock().take();
        let (ingest_rx, fire_rx) = match (ingest_rx, fire_rx) {
            (Some(ingest_rx), Some(fire_rx)) => (ingest_rx, fire_rx),
            (ingest_rx, fire_rx) => {
                *self.ingest_rx.lock() = ingest_rx;
                *self.fire_rx.lock() = fire_rx;
                return Err(NotifierError::InvalidState(
                    "scheduler queues were lost by a failed worker".to_string(),
                ));
            }
        };

        info!(
            poll_interval_secs = self.core.config.poll_interval.as_secs(),
            lookahead_window_secs = self.core.config.lookahead_window.as_secs(),
            "🚀 Starting event scheduler"
        );

        let cancel = CancellationToken::new();
        let core = &self.core;

        *workers = Some(Workers {
            poll: tokio::spawn(Arc::clone(core).poll_loop(cancel.clone())),
            ingest: tokio::spawn(Arc::clone(core).ingest_loop(ingest_rx, cancel.clone())),
            dispatch: tokio::spawn(Arc::clone(core).dispatch_loop(fire_rx, cancel.clone())),
            cancel,
        });
        self.core.running.store(true, Ordering::Release);

        Ok(())
    }

    /// Cancel the workers, disarm every timer and wait for the workers to exit.
    /// Stopping a stopped scheduler is a no-op.
    #[instrument(skip(self), fields(scheduler_id = %self.core.id))]
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.workers.lock().await;
        let Some(workers) = guard.take() else {
            return Ok(());
        };

        info!("🛑 Stopping event scheduler");
        self.core.running.store(false, Ordering::Release);
        workers.cancel.cancel();

        for tracked in self.core.events.write().values_mut() {
            tracked.disarm_all();
        }

        if let Err(e) = workers.poll.await {
            error!(error = %e, "Poll worker terminated abnormally");
        }
        match workers.ingest.await {
            Ok(rx) => *self.ingest_rx.lock() = Some(rx),
            Err(e) => error!(error = %e, "Ingest worker terminated abnormally"),
        }
        match workers.dispatch.await {
            Ok(rx) => *self.fire_rx.lock() = Some(rx),
            Err(e) => error!(error = %e, "Dispatch worker terminated abnormally"),
        }

        info!("Event scheduler stopped");
        Ok(())
    }

    /// Schedule reminders for one event, replacing any previous schedule.
    ///
    /// This is what the ingest worker runs for every polled event; it can be
    /// called directly to push an event without waiting for the next poll.
    /// Timers are tokio tasks, so the call fails outside a tokio runtime.
    pub fn schedule_event(&self, event: Event) -> Result<()> {
        self.core.schedule_event(event)
    }

    /// Deep copy of every tracked event, keyed by event id
    pub fn scheduled_events(&self) -> HashMap<String, ScheduledEvent> {
        self.core
            .events
            .read()
            .iter()
            .map(|(id, tracked)| (id.clone(), tracked.snapshot()))
            .collect()
    }

    pub fn stats(&self) -> SchedulerStats {
        let events = self.core.events.read();
        let mut stats = SchedulerStats {
            total_events: events.len(),
            is_running: self.is_running(),
            ..Default::default()
        };

        for tracked in events.values() {
            for armed in &tracked.notifications {
                if armed.record.sent {
                    stats.sent_notifications += 1;
                } else {
                    stats.pending_notifications += 1;
                }
            }
        }

        stats
    }

    /// Forget events that ended more than a day ago
    pub fn cleanup_old_events(&self) -> usize {
        self.cleanup_events_ended_before(Utc::now() - retention())
    }

    /// Forget events whose end time is before `cutoff`, disarming their timers
    pub fn cleanup_events_ended_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut events = self.core.events.write();
        let expired: Vec<String> = events
            .iter()
            .filter(|(_, tracked)| tracked.event.end_time < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(mut tracked) = events.remove(id) {
                tracked.disarm_all();
                debug!(event_id = %id, "Cleaned up old event");
            }
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "🧹 Cleaned up old events");
        }
        expired.len()
    }
}

fn retention() -> chrono::Duration {
    chrono::Duration::from_std(EVENT_RETENTION).unwrap_or_else(|_| chrono::Duration::days(1))
}

impl SchedulerCore {
    async fn poll_loop(self: Arc<Self>, cancel: CancellationToken) {
        self.poll_once(&cancel).await;

        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.poll_once(&cancel).await,
            }
        }

        debug!(scheduler_id = %self.id, "Poll worker exited");
    }

    #[instrument(skip(self, cancel), fields(scheduler_id = %self.id))]
    async fn poll_once(&self, cancel: &CancellationToken) {
        let from = Utc::now();
        let lookahead = chrono::Duration::from_std(self.config.lookahead_window)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let to = from + lookahead;

        debug!(from = %from.to_rfc3339(), to = %to.to_rfc3339(), "📅 Polling for events");

        let events = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.calendar_manager.get_all_events(cancel, from, to) => match result {
                Ok(events) => events,
                Err(e) => {
                    error!(error = %e, "Failed to fetch events");
                    return;
                }
            },
        };

        debug!(count = events.len(), "Fetched events");

        for event in events {
            match self.ingest_tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    warn!(event_id = %event.id, "Event channel full, dropping event");
                }
                Err(TrySendError::Closed(_)) => return,
            }
        }
    }

    async fn ingest_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<Event>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<Event> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(event) => {
                        if let Err(e) = self.schedule_event(event) {
                            error!(error = %e, "Failed to schedule event");
                        }
                    }
                    None => break,
                },
            }
        }
        rx
    }

    async fn dispatch_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<FireEvent>,
        cancel: CancellationToken,
    ) -> mpsc::Receiver<FireEvent> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(fire) => self.dispatch(fire, &cancel).await,
                    None => break,
                },
            }
        }
        rx
    }

    fn synthesized_alarm(&self, lead_time_minutes: u32) -> Alarm {
        Alarm::new(
            lead_time_minutes,
            DEFAULT_ALARM_METHOD,
            self.config.default_severity.as_str(),
        )
    }

    /// Alarms to schedule: the event's own, else the configured defaults,
    /// plus the final reminder when no alarm already has its lead
    fn resolve_alarms(&self, event: &Event) -> Vec<Alarm> {
        let mut alarms = if event.has_alarms() {
            event.alarms.clone()
        } else {
            self.config
                .default_lead_times
                .iter()
                .map(|&lead| self.synthesized_alarm(lead))
                .collect()
        };

        if let Some(final_minutes) = self.config.final_reminder_minutes {
            if !alarms.iter().any(|a| a.lead_time_minutes == final_minutes) {
                debug!(
                    event_id = %event.id,
                    title = %event.title,
                    lead_time = final_minutes,
                    "Added final reminder"
                );
                alarms.push(self.synthesized_alarm(final_minutes));
            }
        }

        alarms
    }

    fn schedule_event(&self, event: Event) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| {
            NotifierError::InvalidState("scheduling reminders requires a tokio runtime".to_string())
        })?;
        let now = Utc::now();

        if !event.is_upcoming(now) {
            debug!(event_id = %event.id, title = %event.title, "Skipping past event");
            return Ok(());
        }

        if !event.is_accepted() {
            debug!(
                event_id = %event.id,
                title = %event.title,
                response_status = ?event.response_status,
                "Skipping non-accepted event"
            );
            return Ok(());
        }

        let alarms = self.resolve_alarms(&event);
        let mut events = self.events.write();

        if !events.contains_key(&event.id) && events.len() >= self.config.max_concurrent_events {
            warn!(
                event_id = %event.id,
                max_concurrent_events = self.config.max_concurrent_events,
                "Too many tracked events, dropping event"
            );
            return Ok(());
        }

        let tracked = events
            .entry(event.id.clone())
            .or_insert_with(|| TrackedEvent {
                event: event.clone(),
                notifications: Vec::new(),
                last_updated: now,
            });
        tracked.event = event;
        tracked.last_updated = now;

        if alarms.is_empty() {
            debug!(
                event_id = %tracked.event.id,
                title = %tracked.event.title,
                "Event has no alarms, keeping existing notifications"
            );
            return Ok(());
        }

        tracked.disarm_all();
        tracked.notifications.clear();

        let event = &tracked.event;
        let mut armed = Vec::with_capacity(alarms.len());
        for (index, alarm) in alarms.iter().enumerate() {
            let trigger_time = event.trigger_time(alarm);
            if trigger_time <= now {
                debug!(
                    event_id = %event.id,
                    trigger_time = %trigger_time.to_rfc3339(),
                    lead_time = alarm.lead_time_minutes,
                    "Skipping past notification"
                );
                continue;
            }

            let Ok(delay) = (trigger_time - now).to_std() else {
                continue;
            };

            let record = PendingNotification {
                id: format!("{}-{}", event.id, index),
                notification: Notification::new(event, alarm),
                trigger_time,
                sent: false,
            };

            let fire = FireEvent {
                event_id: event.id.clone(),
                notification_id: record.id.clone(),
                trigger_time,
                notification: record.notification.clone(),
            };

            debug!(
                event_id = %event.id,
                notification_id = %record.id,
                title = %event.title,
                trigger_time = %trigger_time.to_rfc3339(),
                lead_time = alarm.lead_time_minutes,
                "Scheduled notification"
            );

            armed.push(ArmedNotification {
                record,
                timer: Some(timer::arm(&runtime, delay, fire, self.fire_tx.clone())),
            });
        }

        tracked.notifications = armed;
        Ok(())
    }

    async fn dispatch(&self, fire: FireEvent, cancel: &CancellationToken) {
        info!(
            event_id = %fire.event_id,
            notification_id = %fire.notification_id,
            title = %fire.notification.title,
            "⏰ Processing timer event"
        );

        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = self.publisher.publish_notification(&fire.notification) => result,
        };

        if let Err(e) = result {
            error!(
                event_id = %fire.event_id,
                title = %fire.notification.title,
                error = %e,
                "Failed to publish notification"
            );
            return;
        }

        if let Some(tracked) = self.events.write().get_mut(&fire.event_id) {
            if let Some(armed) = tracked.notifications.iter_mut().find(|armed| {
                armed.record.id == fire.notification_id
                    && armed.record.trigger_time == fire.trigger_time
            }) {
                armed.record.sent = true;
                armed.timer = None;
            }
        }

        info!(
            event_id = %fire.event_id,
            title = %fire.notification.title,
            lead_time = fire.notification.lead,
            "📤 Notification published successfully"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarError;
    use crate::models::ResponseStatus;
    use crate::publisher::PublishError;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    #[derive(Default)]
    struct StaticCalendar {
        events: Mutex<Vec<Event>>,
        fail: AtomicBool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CalendarManager for StaticCalendar {
        async fn get_all_events(
            &self,
            _cancel: &CancellationToken,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> std::result::Result<Vec<Event>, CalendarError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CalendarError::provider("static", "backend down"));
            }
            Ok(self.events.lock().clone())
        }

        async fn close(&self) -> std::result::Result<(), CalendarError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        published: Mutex<Vec<Notification>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish_notification(
            &self,
            notification: &Notification,
        ) -> std::result::Result<(), PublishError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PublishError::NotConnected);
            }
            self.published.lock().push(notification.clone());
            Ok(())
        }

        async fn close(&self) -> std::result::Result<(), PublishError> {
            Ok(())
        }
    }

    /// Brings the dispatch worker down with it
    struct CrashingPublisher;

    #[async_trait]
    impl Publisher for CrashingPublisher {
        async fn publish_notification(
            &self,
            notification: &Notification,
        ) -> std::result::Result<(), PublishError> {
            if notification.title.is_empty() {
                return Ok(());
            }
            panic!("publisher crashed on {}", notification.title);
        }

        async fn close(&self) -> std::result::Result<(), PublishError> {
            Ok(())
        }
    }

    fn scheduler_with(
        config: SchedulerConfig,
    ) -> (EventScheduler, Arc<StaticCalendar>, Arc<RecordingPublisher>) {
        let calendar = Arc::new(StaticCalendar::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let scheduler = EventScheduler::new(config, calendar.clone(), publisher.clone());
        (scheduler, calendar, publisher)
    }

    fn event_in(id: &str, minutes: i64) -> Event {
        let start = Utc::now() + ChronoDuration::minutes(minutes);
        Event::new(id, format!("Event {id}"), start, start + ChronoDuration::hours(1))
    }

    fn leads(scheduled: &ScheduledEvent) -> Vec<u32> {
        scheduled
            .notifications
            .iter()
            .map(|n| n.notification.lead)
            .collect()
    }

    #[tokio::test]
    async fn test_default_lead_times_create_two_notifications() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());
        let event = event_in("e1", 30);
        let start = event.start_time;

        scheduler.schedule_event(event).unwrap();

        let scheduled = scheduler.scheduled_events();
        let entry = &scheduled["e1"];
        assert_eq!(leads(entry), vec![15, 5]);
        assert_eq!(
            entry.notifications[0].trigger_time,
            start - ChronoDuration::minutes(15)
        );
        assert_eq!(
            entry.notifications[1].trigger_time,
            start - ChronoDuration::minutes(5)
        );
        assert_eq!(entry.notifications[0].id, "e1-0");
        assert!(entry.notifications.iter().all(|n| !n.sent));
        assert_eq!(entry.notifications[0].notification.severity, "normal");
    }

    #[tokio::test]
    async fn test_past_and_current_events_are_rejected() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());

        scheduler.schedule_event(event_in("past", -10)).unwrap();
        assert!(scheduler.scheduled_events().is_empty());
    }

    #[tokio::test]
    async fn test_response_status_filter() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());

        scheduler
            .schedule_event(event_in("declined", 60).with_response_status(ResponseStatus::Declined))
            .unwrap();
        scheduler
            .schedule_event(event_in("tentative", 60).with_response_status(ResponseStatus::Tentative))
            .unwrap();
        scheduler
            .schedule_event(event_in("needs", 60).with_response_status(ResponseStatus::NeedsAction))
            .unwrap();
        scheduler
            .schedule_event(event_in("accepted", 60).with_response_status(ResponseStatus::Accepted))
            .unwrap();
        scheduler.schedule_event(event_in("none", 60)).unwrap();

        let scheduled = scheduler.scheduled_events();
        let mut ids: Vec<&String> = scheduled.keys().collect();
        ids.sort();
        assert_eq!(ids, vec!["accepted", "none"]);
    }

    #[tokio::test]
    async fn test_passed_alarm_is_dropped_but_event_tracked() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());

        scheduler.schedule_event(event_in("soon", 10)).unwrap();
        assert_eq!(leads(&scheduler.scheduled_events()["soon"]), vec![5]);

        scheduler.schedule_event(event_in("very-soon", 3)).unwrap();
        let scheduled = scheduler.scheduled_events();
        assert!(scheduled.contains_key("very-soon"));
        assert!(scheduled["very-soon"].notifications.is_empty());
    }

    #[tokio::test]
    async fn test_native_alarms_take_precedence() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());

        scheduler
            .schedule_event(event_in("e1", 120).with_alarm(Alarm::new(60, "email", "high")))
            .unwrap();

        let scheduled = scheduler.scheduled_events();
        assert_eq!(leads(&scheduled["e1"]), vec![60]);
        assert_eq!(scheduled["e1"].notifications[0].notification.severity, "high");
    }

    #[tokio::test]
    async fn test_final_reminder_added_once() {
        let config = SchedulerConfig {
            final_reminder_minutes: Some(1),
            ..Default::default()
        };
        let (scheduler, _, _) = scheduler_with(config);

        scheduler.schedule_event(event_in("e1", 30)).unwrap();
        assert_eq!(leads(&scheduler.scheduled_events()["e1"]), vec![15, 5, 1]);

        scheduler.schedule_event(event_in("e2", 30).with_alarm(Alarm::popup(1))).unwrap();
        assert_eq!(leads(&scheduler.scheduled_events()["e2"]), vec![1]);
    }

    #[tokio::test]
    async fn test_event_without_alarms_keeps_existing_notifications() {
        let config = SchedulerConfig {
            default_lead_times: Vec::new(),
            ..Default::default()
        };
        let (scheduler, _, _) = scheduler_with(config);

        scheduler.schedule_event(event_in("e1", 30).with_alarm(Alarm::popup(10))).unwrap();
        assert_eq!(leads(&scheduler.scheduled_events()["e1"]), vec![10]);

        let mut renamed = event_in("e1", 30);
        renamed.title = "Renamed".to_string();
        scheduler.schedule_event(renamed).unwrap();

        let scheduled = scheduler.scheduled_events();
        assert_eq!(scheduled["e1"].event.title, "Renamed");
        assert_eq!(leads(&scheduled["e1"]), vec![10]);
    }

    #[tokio::test]
    async fn test_reschedule_replaces_notifications() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());

        scheduler.schedule_event(event_in("e1", 60).with_alarm(Alarm::popup(30))).unwrap();
        scheduler.schedule_event(event_in("e1", 90).with_alarm(Alarm::popup(45))).unwrap();

        let stats = scheduler.stats();
        assert_eq!(stats.total_events, 1);
        assert_eq!(stats.pending_notifications, 1);
        assert_eq!(leads(&scheduler.scheduled_events()["e1"]), vec![45]);
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_events_ended_before_cutoff() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());
        let early = event_in("early", 60);
        let late = event_in("late", 600);
        let cutoff = early.end_time + ChronoDuration::minutes(1);

        scheduler.schedule_event(early).unwrap();
        scheduler.schedule_event(late).unwrap();

        assert_eq!(scheduler.cleanup_old_events(), 0);
        assert_eq!(scheduler.cleanup_events_ended_before(cutoff), 1);

        let scheduled = scheduler.scheduled_events();
        assert!(!scheduled.contains_key("early"));
        assert!(scheduled.contains_key("late"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_leaves_surviving_timers_armed() {
        let (scheduler, _, publisher) = scheduler_with(SchedulerConfig::default());
        scheduler.start().await.unwrap();

        let early = event_in("early", 60);
        let late = event_in("late", 120);
        let cutoff = early.end_time + ChronoDuration::minutes(1);
        scheduler.schedule_event(early).unwrap();
        scheduler.schedule_event(late).unwrap();

        assert_eq!(scheduler.cleanup_events_ended_before(cutoff), 1);
        assert_eq!(scheduler.stats().pending_notifications, 2);

        tokio::time::sleep(Duration::from_secs(116 * 60)).await;

        let published: Vec<(String, u32)> = publisher
            .published
            .lock()
            .iter()
            .map(|n| (n.title.clone(), n.lead))
            .collect();
        assert_eq!(
            published,
            vec![("Event late".to_string(), 15), ("Event late".to_string(), 5)]
        );
        assert_eq!(scheduler.stats().sent_notifications, 2);

        scheduler.stop().await.unwrap();
    }

    #[test]
    fn test_schedule_event_outside_runtime_is_an_error() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());

        let result = scheduler.schedule_event(event_in("e1", 30));
        assert!(matches!(result, Err(NotifierError::InvalidState(_))));
        assert!(scheduler.scheduled_events().is_empty());
    }

    #[tokio::test]
    async fn test_max_concurrent_events() {
        let config = SchedulerConfig {
            max_concurrent_events: 1,
            ..Default::default()
        };
        let (scheduler, _, _) = scheduler_with(config);

        scheduler.schedule_event(event_in("a", 60)).unwrap();
        scheduler.schedule_event(event_in("b", 60)).unwrap();
        scheduler.schedule_event(event_in("a", 70)).unwrap();

        let scheduled = scheduler.scheduled_events();
        assert_eq!(scheduled.len(), 1);
        assert!(scheduled.contains_key("a"));
    }

    #[tokio::test]
    async fn test_start_twice_fails_and_stop_is_idempotent() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig::default());

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.stats().is_running);

        let second = scheduler.start().await;
        assert!(matches!(second, Err(NotifierError::InvalidState(_))));

        scheduler.stop().await.unwrap();
        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running());

        // Queues are handed back, so the scheduler can run again
        scheduler.start().await.unwrap();
        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let (scheduler, _, _) = scheduler_with(SchedulerConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        });

        let result = scheduler.start().await;
        assert!(matches!(result, Err(NotifierError::ConfigurationError(_))));
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_dispatch_crash_reports_lost_queue() {
        let scheduler = EventScheduler::new(
            SchedulerConfig::default(),
            Arc::new(StaticCalendar::default()),
            Arc::new(CrashingPublisher),
        );
        scheduler.start().await.unwrap();
        scheduler.schedule_event(event_in("e1", 30)).unwrap();

        // First reminder fires and takes the dispatch worker down
        tokio::time::sleep(Duration::from_secs(16 * 60)).await;
        scheduler.stop().await.unwrap();

        let restarted = tokio::time::timeout(Duration::from_secs(1), scheduler.start())
            .await
            .expect("start returned without blocking");
        assert!(matches!(restarted, Err(NotifierError::InvalidState(_))));
        assert!(!scheduler.is_running());
        assert!(scheduler.ingest_rx.lock().is_some());

        let again = scheduler.start().await;
        assert!(matches!(again, Err(NotifierError::InvalidState(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_poll_ingests_events() {
        let (scheduler, calendar, _) = scheduler_with(SchedulerConfig::default());
        calendar.events.lock().push(event_in("polled", 60));

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);
        assert!(scheduler.scheduled_events().contains_key("polled"));

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 2);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_failure_is_logged_and_skipped() {
        let (scheduler, calendar, _) = scheduler_with(SchedulerConfig::default());
        calendar.fail.store(true, Ordering::SeqCst);

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(scheduler.scheduled_events().is_empty());

        calendar.fail.store(false, Ordering::SeqCst);
        calendar.events.lock().push(event_in("later", 60));
        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        assert!(scheduler.scheduled_events().contains_key("later"));

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fire_publishes_and_marks_sent() {
        let (scheduler, _, publisher) = scheduler_with(SchedulerConfig::default());
        scheduler.start().await.unwrap();

        scheduler.schedule_event(event_in("e1", 30)).unwrap();
        tokio::time::sleep(Duration::from_secs(16 * 60)).await;

        let stats = scheduler.stats();
        assert_eq!(stats.sent_notifications, 1);
        assert_eq!(stats.pending_notifications, 1);

        let published = publisher.published.lock().clone();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].lead, 15);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_failure_leaves_notification_unsent() {
        let (scheduler, _, publisher) = scheduler_with(SchedulerConfig::default());
        publisher.fail.store(true, Ordering::SeqCst);
        scheduler.start().await.unwrap();

        scheduler.schedule_event(event_in("e1", 30)).unwrap();
        tokio::time::sleep(Duration::from_secs(30 * 60)).await;

        let stats = scheduler.stats();
        assert_eq!(stats.sent_notifications, 0);
        assert_eq!(stats.pending_notifications, 2);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_disarms_timers() {
        let (scheduler, _, publisher) = scheduler_with(SchedulerConfig::default());
        scheduler.start().await.unwrap();
        scheduler.schedule_event(event_in("e1", 30)).unwrap();

        scheduler.stop().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;

        assert!(publisher.published.lock().is_empty());
        assert_eq!(scheduler.stats().pending_notifications, 2);
    }
}
