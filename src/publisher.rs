//! # Notification Publishing
//!
//! The [`Publisher`] trait is the outbound seam of the notifier; the message
//! transport behind it lives outside this crate. Two implementations ship here:
//!
//! - [`DryRunPublisher`] logs every notification instead of sending it
//! - [`ResilientPublisher`] wraps any publisher with retry and a circuit breaker
//!
//! ```rust
//! use calendar_notifier::models::{Alarm, Event, Notification};
//! use calendar_notifier::publisher::{DryRunPublisher, Publisher};
//! use chrono::{Duration, Utc};
//!
//! # tokio_test::block_on(async {
//! let start = Utc::now() + Duration::hours(1);
//! let event = Event::new("standup", "Daily standup", start, start + Duration::minutes(15));
//! let notification = Notification::new(&event, &Alarm::popup(10));
//!
//! let publisher = DryRunPublisher::new();
//! publisher.publish_notification(&notification).await.unwrap();
//! assert_eq!(publisher.published_count(), 1);
//! # });
//! ```

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::Notification;
use crate::resilience::{
    render_chain, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, RetryConfig,
    RetryError, Retryer, TransportError,
};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publisher connection is not available")]
    NotConnected,

    #[error("publisher is closed")]
    Closed,

    #[error("failed to serialize notification: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to publish notification: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to publish notification: {0}")]
    Failed(String),

    #[error("circuit breaker open for publisher")]
    CircuitOpen,

    #[error("publishing failed after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },

    #[error("publishing cancelled")]
    Cancelled,

    #[error("failed to publish {failed} out of {total} notifications")]
    Batch { failed: usize, total: usize },
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_notification(&self, notification: &Notification) -> Result<(), PublishError>;

    async fn close(&self) -> Result<(), PublishError>;

    /// Publish each notification in turn; failures are counted, not fatal
    async fn publish_notifications(
        &self,
        notifications: &[Notification],
    ) -> Result<(), PublishError> {
        if notifications.is_empty() {
            return Ok(());
        }

        let mut failed = 0;
        for notification in notifications {
            if let Err(e) = self.publish_notification(notification).await {
                warn!(title = %notification.title, error = %e, "Failed to publish notification");
                failed += 1;
            }
        }

        debug!(
            total = notifications.len(),
            failed = failed,
            "Published notification batch"
        );

        if failed > 0 {
            return Err(PublishError::Batch {
                failed,
                total: notifications.len(),
            });
        }
        Ok(())
    }
}

/// Logs notifications instead of delivering them
#[derive(Debug, Default)]
pub struct DryRunPublisher {
    published: AtomicU64,
    closed: AtomicBool,
}

impl DryRunPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Publisher for DryRunPublisher {
    async fn publish_notification(&self, notification: &Notification) -> Result<(), PublishError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PublishError::Closed);
        }

        let payload = notification.to_json()?;
        self.published.fetch_add(1, Ordering::Relaxed);

        info!(
            title = %notification.title,
            when = %notification.when.to_rfc3339(),
            lead = notification.lead,
            severity = %notification.severity,
            bytes = payload.len(),
            "📤 [dry-run] Would publish notification"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.closed.store(true, Ordering::Release);
        info!(
            published = self.published_count(),
            "Dry-run publisher closed"
        );
        Ok(())
    }
}

/// Adds retry and circuit breaking in front of another publisher
pub struct ResilientPublisher<P> {
    inner: P,
    retryer: Retryer,
    breaker: Arc<CircuitBreaker>,
    shutdown: CancellationToken,
}

impl<P: Publisher> ResilientPublisher<P> {
    pub fn new(inner: P, retry_config: RetryConfig, breaker_config: CircuitBreakerConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new("publisher", breaker_config));
        Self::with_breaker(inner, retry_config, breaker)
    }

    /// Share a breaker owned elsewhere, typically by a `CircuitBreakerManager`
    pub fn with_breaker(inner: P, retry_config: RetryConfig, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            inner,
            retryer: Retryer::new("publisher", retry_config),
            breaker,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

#[async_trait]
impl<P: Publisher> Publisher for ResilientPublisher<P> {
    async fn publish_notification(&self, notification: &Notification) -> Result<(), PublishError> {
        let result = self
            .breaker
            .execute(|| {
                self.retryer.run(&self.shutdown, || {
                    self.inner.publish_notification(notification)
                })
            })
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(CircuitBreakerError::CircuitOpen { .. }) => Err(PublishError::CircuitOpen),
            Err(CircuitBreakerError::OperationFailed(retry_error)) => match retry_error {
                RetryError::Cancelled { .. } => Err(PublishError::Cancelled),
                RetryError::NonRetriable { source, .. } => Err(source),
                RetryError::Exhausted { attempts, source } => Err(PublishError::RetriesExhausted {
                    attempts,
                    reason: render_chain(&source),
                }),
            },
        }
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.shutdown.cancel();
        self.inner.close().await
    }
}
