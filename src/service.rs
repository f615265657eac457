//! # Notifier Service
//!
//! Top-level wiring: owns the scheduler together with the calendar manager
//! and publisher it drives, and runs the periodic cleanup of finished events.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::calendar::{CalendarManager, MultiCalendarManager, ProviderRegistry};
use crate::config::NotifierConfig;
use crate::constants::CLEANUP_INTERVAL;
use crate::error::{NotifierError, Result};
use crate::publisher::Publisher;
use crate::resilience::CircuitBreakerManager;
use crate::scheduler::{EventScheduler, SchedulerConfig};

struct CleanupLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct NotifierService {
    scheduler: Arc<EventScheduler>,
    calendar_manager: Arc<dyn CalendarManager>,
    publisher: Arc<dyn Publisher>,
    cleanup_interval: Duration,
    cleanup: Mutex<Option<CleanupLoop>>,
}

impl std::fmt::Debug for NotifierService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierService")
            .field("scheduler", &self.scheduler)
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

impl NotifierService {
    pub fn new(
        scheduler_config: SchedulerConfig,
        calendar_manager: Arc<dyn CalendarManager>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let scheduler = Arc::new(EventScheduler::new(
            scheduler_config,
            Arc::clone(&calendar_manager),
            Arc::clone(&publisher),
        ));

        Self {
            scheduler,
            calendar_manager,
            publisher,
            cleanup_interval: CLEANUP_INTERVAL,
            cleanup: Mutex::new(None),
        }
    }

    /// Build the service from a validated configuration: one provider per
    /// configured calendar, each behind its own circuit breaker
    pub fn from_config(
        config: &NotifierConfig,
        registry: &ProviderRegistry,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self> {
        let breakers = Arc::new(CircuitBreakerManager::new(
            config.to_circuit_breaker_config()?,
        ));
        let calendar_manager = MultiCalendarManager::new(
            config.to_coordinator_config()?,
            config.to_retry_config()?,
            breakers,
        );
        calendar_manager.add_providers_from_config(registry, &config.calendars)?;

        Ok(Self::new(
            config.to_scheduler_config()?,
            Arc::new(calendar_manager),
            publisher,
        ))
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn scheduler(&self) -> &Arc<EventScheduler> {
        &self.scheduler
    }

    pub fn calendar_manager(&self) -> &Arc<dyn CalendarManager> {
        &self.calendar_manager
    }

    /// Start the scheduler and the cleanup loop
    pub async fn start(&self) -> Result<()> {
        let mut cleanup = self.cleanup.lock().await;
        if cleanup.is_some() {
            return Err(NotifierError::InvalidState(
                "notifier service is already running".to_string(),
            ));
        }

        self.scheduler.start().await?;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(cleanup_loop(
            Arc::clone(&self.scheduler),
            self.cleanup_interval,
            cancel.clone(),
        ));
        *cleanup = Some(CleanupLoop { cancel, handle });

        info!(
            cleanup_interval_secs = self.cleanup_interval.as_secs(),
            "✅ Notifier service started"
        );
        Ok(())
    }

    /// Stop the scheduler and release the publisher and calendar sources.
    ///
    /// Close failures are logged; shutdown always runs to completion.
    pub async fn stop(&self) -> Result<()> {
        if let Some(cleanup) = self.cleanup.lock().await.take() {
            cleanup.cancel.cancel();
            if let Err(e) = cleanup.handle.await {
                error!(error = %e, "Cleanup loop terminated abnormally");
            }
        }

        self.scheduler.stop().await?;

        if let Err(e) = self.publisher.close().await {
            warn!(error = %e, "Failed to close publisher");
        }
        if let Err(e) = self.calendar_manager.close().await {
            warn!(error = %e, "Failed to close calendar manager");
        }

        info!("Notifier service stopped");
        Ok(())
    }
}

async fn cleanup_loop(scheduler: Arc<EventScheduler>, period: Duration, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(period) => {
                scheduler.cleanup_old_events();
            }
            _ = cancel.cancelled() => {
                info!("Cleanup loop shutting down");
                break;
            }
        }
    }
}
