#![allow(clippy::doc_markdown)] // Allow technical terms like CalDAV, iCal in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Calendar Notifier
//!
//! Turns calendar events from several sources into precisely timed reminder
//! notifications.
//!
//! ## Overview
//!
//! Events are polled from every configured calendar, reconciled into a single
//! deduplicated timeline and handed to a scheduler that arms one timer per
//! reminder. When a timer fires, the reminder is published to the outbound
//! notification channel. Remote calls are protected by retry with
//! exponential backoff and by per-source circuit breakers.
//!
//! ## Module Organization
//!
//! - [`models`] - Events, alarms and notifications
//! - [`calendar`] - Provider seam, multi-source manager and the event coordinator
//! - [`scheduler`] - Timer-driven reminder scheduling
//! - [`publisher`] - Outbound notification seam
//! - [`resilience`] - Retry, circuit breakers and error classification
//! - [`config`] - File configuration and validation
//! - [`service`] - Top-level wiring of the components above
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use calendar_notifier::calendar::ProviderRegistry;
//! use calendar_notifier::config::ConfigManager;
//! use calendar_notifier::logging::init_structured_logging;
//! use calendar_notifier::publisher::DryRunPublisher;
//! use calendar_notifier::service::NotifierService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/notifier.yaml")?;
//! init_structured_logging(&manager.config().logging);
//!
//! let registry = ProviderRegistry::new();
//! let service = NotifierService::from_config(
//!     manager.config(),
//!     &registry,
//!     Arc::new(DryRunPublisher::new()),
//! )?;
//!
//! service.start().await?;
//! tokio::signal::ctrl_c().await?;
//! service.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod calendar;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod publisher;
pub mod resilience;
pub mod scheduler;
pub mod service;

pub use calendar::{CalendarManager, CalendarProvider, EventCoordinator, MultiCalendarManager};
pub use config::{ConfigManager, NotifierConfig};
pub use error::{NotifierError, Result};
pub use models::{Alarm, Event, Notification, ResponseStatus};
pub use publisher::{DryRunPublisher, Publisher, ResilientPublisher};
pub use resilience::{CircuitBreaker, CircuitBreakerManager, Retryer};
pub use scheduler::{EventScheduler, SchedulerConfig};
pub use service::NotifierService;
