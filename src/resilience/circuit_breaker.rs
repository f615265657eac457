//! # Circuit Breaker
//!
//! Fault isolation for flaky upstreams with the classic three states:
//! Closed (calls pass), Open (calls fail fast) and Half-Open (calls probe
//! whether the upstream recovered).
//!
//! All counters and the state live behind one mutex. The lock is only held
//! while deciding whether a call may run and while recording its outcome,
//! never across the protected operation itself.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::{CircuitBreakerConfig, CircuitBreakerMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed,
    /// Failure mode - all calls fail fast without executing
    Open,
    /// Testing recovery - calls run and decide the next state
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Errors returned by [`CircuitBreaker::execute`]
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// Circuit is open, the operation was not invoked
    #[error("circuit breaker is open for {component}")]
    CircuitOpen { component: String },

    /// Operation ran, failed and was recorded
    #[error("operation failed: {0}")]
    OperationFailed(#[source] E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::CircuitOpen { .. })
    }

    /// The operation's own error, `None` for a rejected call
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::CircuitOpen { .. } => None,
            CircuitBreakerError::OperationFailed(error) => Some(error),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
    metrics: CircuitBreakerMetrics,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let name = name.into();
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            open_timeout_ms = config.open_timeout.as_millis() as u64,
            success_threshold = config.success_threshold,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            name,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                last_failure: None,
                metrics: CircuitBreakerMetrics::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state; an expired open timeout is reported as still open
    /// until the next call flips it
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Run `operation` under circuit breaker protection
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.allow_call() {
            return Err(CircuitBreakerError::CircuitOpen {
                component: self.name.clone(),
            });
        }

        let start = Instant::now();
        let result = operation().await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => self.record_success(duration),
            Err(_) => self.record_failure(duration),
        }

        result.map_err(CircuitBreakerError::OperationFailed)
    }

    fn allow_call(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.config.open_timeout);

                if expired {
                    inner.state = CircuitState::HalfOpen;
                    inner.successes = 0;
                    info!(
                        component = %self.name,
                        success_threshold = self.config.success_threshold,
                        "🟡 Circuit breaker half-open (testing recovery)"
                    );
                    true
                } else {
                    inner.metrics.rejected_calls += 1;
                    debug!(component = %self.name, "Circuit open, rejecting call");
                    false
                }
            }
        }
    }

    fn record_success(&self, duration: std::time::Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.success_count += 1;
        inner.metrics.total_duration += duration;
        inner.failures = 0;

        if inner.state == CircuitState::HalfOpen {
            inner.successes += 1;
            if inner.successes >= self.config.success_threshold {
                inner.state = CircuitState::Closed;
                inner.successes = 0;
                info!(
                    component = %self.name,
                    total_calls = inner.metrics.total_calls,
                    "🟢 Circuit breaker closed (recovered)"
                );
            }
        }
    }

    fn record_failure(&self, duration: std::time::Duration) {
        let mut inner = self.inner.lock();
        inner.metrics.total_calls += 1;
        inner.metrics.failure_count += 1;
        inner.metrics.total_duration += duration;
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());

        debug!(
            component = %self.name,
            consecutive_failures = inner.failures,
            duration_ms = duration.as_millis() as u64,
            "Operation failed"
        );

        let should_open = match inner.state {
            CircuitState::Closed => inner.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };

        if should_open {
            inner.state = CircuitState::Open;
            inner.successes = 0;
            error!(
                component = %self.name,
                consecutive_failures = inner.failures,
                failure_threshold = self.config.failure_threshold,
                open_timeout_ms = self.config.open_timeout.as_millis() as u64,
                "🔴 Circuit breaker opened (failing fast)"
            );
        }
    }

    /// Force circuit to open state, restarting the open timeout
    pub fn force_open(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced open");
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Open;
        inner.successes = 0;
        inner.last_failure = Some(Instant::now());
    }

    /// Force circuit to closed state with cleared counters
    pub fn force_closed(&self) {
        warn!(component = %self.name, "🚨 Circuit breaker forced closed");
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.successes = 0;
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let inner = self.inner.lock();
        let mut snapshot = inner.metrics.clone();
        snapshot.current_state = inner.state;
        snapshot.consecutive_failures = inner.failures;
        snapshot.half_open_successes = inner.successes;
        snapshot
    }
}
