//! # Scheduler Types
//!
//! Snapshot types handed out by the scheduler and the message a timer sends
//! when it fires. Snapshots are plain copies; mutating them has no effect on
//! the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Event, Notification};

/// One reminder of a scheduled event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    /// `<event id>-<alarm index>`
    pub id: String,
    pub notification: Notification,
    pub trigger_time: DateTime<Utc>,
    pub sent: bool,
}

/// An event tracked by the scheduler together with its reminders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub event: Event,
    pub notifications: Vec<PendingNotification>,
    pub last_updated: DateTime<Utc>,
}

impl ScheduledEvent {
    pub fn pending_count(&self) -> usize {
        self.notifications.iter().filter(|n| !n.sent).count()
    }

    pub fn sent_count(&self) -> usize {
        self.notifications.iter().filter(|n| n.sent).count()
    }
}

/// Sent by a timer to the dispatch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FireEvent {
    pub event_id: String,
    pub notification_id: String,
    pub trigger_time: DateTime<Utc>,
    pub notification: Notification,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_events: usize,
    pub pending_notifications: usize,
    pub sent_notifications: usize,
    pub is_running: bool,
}
