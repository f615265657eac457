//! # Calendar Module
//!
//! Everything between the calendar backends and the scheduler:
//!
//! - [`CalendarProvider`]: the narrow seam a concrete backend (CalDAV, iCal
//!   feed, Google) implements
//! - [`ProviderRegistry`]: builds providers from configuration by type
//! - [`EventCoordinator`]: merges duplicates across calendars and orders the
//!   combined timeline
//! - [`MultiCalendarManager`]: fans out to every provider behind retry and
//!   circuit breaker protection, then coordinates the result
//!
//! The scheduler only sees the [`CalendarManager`] trait.

pub mod coordinator;
pub mod manager;
pub mod provider;
pub mod similarity;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::Event;
use crate::resilience::{FetchError, HttpError, TransportError};

pub use coordinator::{CoordinationStats, CoordinatorConfig, EventCoordinator, MergeStrategy};
pub use manager::MultiCalendarManager;
pub use provider::{ProviderConstructor, ProviderRegistry};
pub use similarity::titles_similar;

/// Errors raised by calendar providers and the calendar manager
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("calendar backend returned {0}")]
    Http(#[from] HttpError),

    #[error("calendar backend unreachable: {0}")]
    Transport(#[from] TransportError),

    #[error("calendar request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("unsupported provider type: {0}")]
    UnsupportedProvider(String),

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("circuit breaker open for calendar provider {provider}")]
    CircuitOpen { provider: String },

    #[error("calendar provider {provider} failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        reason: String,
    },

    #[error("calendar request to {provider} cancelled")]
    Cancelled { provider: String },
}

impl CalendarError {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        CalendarError::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Metadata about one calendar exposed by a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, rename = "timezone", skip_serializing_if = "String::is_empty")]
    pub time_zone: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_role: String,
}

impl Calendar {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A single calendar backend
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Human-readable name of this provider instance
    fn name(&self) -> &str;

    /// Provider type identifier (`caldav`, `ical`, `google`, ...)
    fn provider_type(&self) -> &str;

    async fn get_calendars(&self) -> Result<Vec<Calendar>, CalendarError>;

    /// Events of the given calendars that overlap `[from, to]`
    async fn get_events(
        &self,
        calendar_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError>;

    async fn is_healthy(&self) -> Result<(), CalendarError>;

    async fn close(&self) -> Result<(), CalendarError>;
}

/// Source of the coordinated event timeline consumed by the scheduler
#[async_trait]
pub trait CalendarManager: Send + Sync {
    async fn get_all_events(
        &self,
        cancel: &CancellationToken,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError>;

    async fn close(&self) -> Result<(), CalendarError>;
}
