//! # Resilience Module
//!
//! Fault tolerance primitives for calls to unreliable upstreams: calendar
//! backends and the notification publisher.
//!
//! ## Architecture
//!
//! - **Retry**: [`Retryer`] re-runs an operation with exponential backoff while
//!   the [`ErrorClassifier`] considers its failures transient
//! - **Circuit Breakers**: [`CircuitBreaker`] isolates a failing upstream;
//!   [`CircuitBreakerManager`] keeps one per component
//! - **Metrics**: snapshots of breaker counters for health reporting
//!
//! ## Usage
//!
//! ```rust,no_run
//! use calendar_notifier::resilience::{CircuitBreaker, CircuitBreakerConfig, RetryConfig, Retryer};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new("calendar:work", CircuitBreakerConfig::for_calendar_provider());
//! let retryer = Retryer::new("calendar:work", RetryConfig::default());
//! let cancel = CancellationToken::new();
//!
//! let events = breaker
//!     .execute(|| retryer.run_with_result(&cancel, || async {
//!         Ok::<_, std::io::Error>(vec!["event"])
//!     }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod classify;
pub mod config;
pub mod manager;
pub mod metrics;
pub mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerError, CircuitState};
pub use classify::{
    render_chain, ErrorClassifier, FetchError, HttpError, OperationCancelled, TransportError,
};
pub use config::{CircuitBreakerConfig, RetryConfig};
pub use manager::CircuitBreakerManager;
pub use metrics::{CircuitBreakerMetrics, SystemCircuitBreakerMetrics};
pub use retry::{AttemptInfo, RetryError, Retryer};
