//! One-shot notification timers.
//!
//! Each armed reminder owns a tokio task that sleeps until the trigger and
//! then hands a [`FireEvent`] to the dispatch queue without waiting. Dropping
//! or cancelling the handle aborts the task.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::types::FireEvent;

#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Arm a timer on `runtime` that enqueues `fire` on `queue` after `delay`.
///
/// A full queue drops the fire event with a warning.
pub fn arm(
    runtime: &Handle,
    delay: Duration,
    fire: FireEvent,
    queue: mpsc::Sender<FireEvent>,
) -> TimerHandle {
    let task = runtime.spawn(async move {
        tokio::time::sleep(delay).await;

        match queue.try_send(fire) {
            Ok(()) => {}
            Err(TrySendError::Full(fire)) => {
                warn!(
                    event_id = %fire.event_id,
                    notification_id = %fire.notification_id,
                    "Timer channel full, dropping notification"
                );
            }
            Err(TrySendError::Closed(fire)) => {
                debug!(
                    notification_id = %fire.notification_id,
                    "Timer fired after dispatch queue closed"
                );
            }
        }
    });

    TimerHandle { task }
}
