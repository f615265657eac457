//! Error types for the calendar notifier.
//!

use crate::calendar::CalendarError;
use crate::config::ConfigurationError;
use crate::publisher::PublishError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Calendar error: {0}")]
    CalendarError(String),
    #[error("Publish error: {0}")]
    PublishError(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
    #[error("Retries exhausted after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigurationError> for NotifierError {
    fn from(error: ConfigurationError) -> Self {
        NotifierError::ConfigurationError(error.to_string())
    }
}

impl From<CalendarError> for NotifierError {
    fn from(error: CalendarError) -> Self {
        match error {
            CalendarError::CircuitOpen { provider } => NotifierError::CircuitBreakerOpen(provider),
            CalendarError::RetriesExhausted {
                attempts, reason, ..
            } => NotifierError::RetriesExhausted { attempts, reason },
            CalendarError::Cancelled { provider } => NotifierError::Cancelled(provider),
            other => NotifierError::CalendarError(other.to_string()),
        }
    }
}

impl From<PublishError> for NotifierError {
    fn from(error: PublishError) -> Self {
        match error {
            PublishError::CircuitOpen => {
                NotifierError::CircuitBreakerOpen("publisher".to_string())
            }
            other => NotifierError::PublishError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for NotifierError {
    fn from(error: serde_json::Error) -> Self {
        NotifierError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, NotifierError>;
