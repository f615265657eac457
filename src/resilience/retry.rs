//! # Retry with Exponential Backoff
//!
//! [`Retryer`] re-runs a fallible async operation while its failures classify
//! as retriable. Sleeps between attempts grow by `backoff_factor`, are capped
//! at `max_delay` and optionally receive up to 10% positive jitter. Every
//! sleep races a [`CancellationToken`], so a shutdown aborts the backoff
//! immediately instead of waiting it out.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classify::{render_chain, ErrorClassifier};
use super::config::RetryConfig;

/// Why a retried operation ultimately failed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// Cancellation arrived while waiting for the next attempt
    #[error("retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// The failure was classified as permanent; remaining attempts were not used
    #[error("non-retriable error on attempt {attempt}: {source}")]
    NonRetriable {
        attempt: u32,
        #[source]
        source: E,
    },

    #[error("operation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E> {
    /// Attempts actually made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Cancelled { attempts } => *attempts,
            RetryError::NonRetriable { attempt, .. } => *attempt,
            RetryError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }

    /// The last operation error, if the operation ran at all
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Cancelled { .. } => None,
            RetryError::NonRetriable { source, .. } | RetryError::Exhausted { source, .. } => {
                Some(source)
            }
        }
    }
}

/// Observation passed to an attempt observer after every attempt
#[derive(Debug, Clone)]
pub struct AttemptInfo {
    /// 1-based attempt number
    pub attempt: u32,
    /// Time spent in this attempt
    pub elapsed: Duration,
    /// Rendered error of this attempt, `None` on success
    pub last_error: Option<String>,
}

type AttemptObserver = Arc<dyn Fn(&AttemptInfo) + Send + Sync>;

/// Retry driver with exponential backoff
#[derive(Clone)]
pub struct Retryer {
    name: String,
    config: RetryConfig,
    classifier: ErrorClassifier,
    observer: Option<AttemptObserver>,
}

impl fmt::Debug for Retryer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retryer")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}

impl Retryer {
    pub fn new(name: impl Into<String>, config: RetryConfig) -> Self {
        let classifier = ErrorClassifier::new(&config);
        Self {
            name: name.into(),
            config,
            classifier,
            observer: None,
        }
    }

    /// Invoke `observer` after every attempt, successful or not
    pub fn with_attempt_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&AttemptInfo) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Run an operation without a result value
    pub async fn run<F, Fut, E>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<(), RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: StdError + 'static,
    {
        self.run_with_result(cancel, operation).await
    }

    /// Run an operation and return its value from the first successful attempt
    pub async fn run_with_result<T, F, Fut, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: StdError + 'static,
    {
        let start = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if attempt > 1 {
                let delay = self.calculate_delay(attempt - 1);
                debug!(
                    retryer = %self.name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "🔁 Retrying after delay"
                );

                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(retryer = %self.name, attempt = attempt, "Retry cancelled during backoff");
                        return Err(RetryError::Cancelled { attempts: attempt - 1 });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let attempt_start = Instant::now();
            let result = operation().await;
            self.notify_observer(attempt, attempt_start.elapsed(), result.as_ref().err());

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            retryer = %self.name,
                            attempt = attempt,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "🟢 Operation succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            if !self.classifier.is_retriable(&error) {
                debug!(
                    retryer = %self.name,
                    attempt = attempt,
                    error = %render_chain(&error),
                    "Error is not retriable, stopping retries"
                );
                return Err(RetryError::NonRetriable {
                    attempt,
                    source: error,
                });
            }

            if attempt >= max_attempts {
                warn!(
                    retryer = %self.name,
                    attempts = max_attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    last_error = %render_chain(&error),
                    "🔴 Max retry attempts reached"
                );
                return Err(RetryError::Exhausted {
                    attempts: max_attempts,
                    source: error,
                });
            }

            attempt += 1;
        }
    }

    /// Backoff before the attempt following `attempt_number` failed attempts:
    /// `initial_delay * backoff_factor^attempt_number`, capped at `max_delay`
    pub fn calculate_delay(&self, attempt_number: u32) -> Duration {
        let exponent = i32::try_from(attempt_number).unwrap_or(i32::MAX);
        let raw = self.config.initial_delay.as_secs_f64() * self.config.backoff_factor.powi(exponent);
        // f64::min discards NaN, so 0 * inf still lands on max_delay
        let capped = raw.min(self.config.max_delay.as_secs_f64()).max(0.0);

        let delay = if self.config.jitter {
            capped + fastrand::f64() * 0.1 * capped
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }

    fn notify_observer<E>(&self, attempt: u32, elapsed: Duration, error: Option<&E>)
    where
        E: StdError + 'static,
    {
        if let Some(observer) = &self.observer {
            observer(&AttemptInfo {
                attempt,
                elapsed,
                last_error: error.map(|e| render_chain(e)),
            });
        }
    }
}
