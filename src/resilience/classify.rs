//! # Upstream Error Classification
//!
//! Decides whether a failed upstream call is worth retrying. The classifier
//! walks the whole `source()` chain of an error, so wrapping layers such as
//! [`FetchError`] or a crate error enum do not hide the underlying cause.
//!
//! Precedence, first match wins:
//!
//! 1. Cancellation or an elapsed deadline anywhere in the chain: never retried
//! 2. [`HttpError`] anywhere in the chain: retried iff its status is configured
//! 3. [`TransportError`] or a network-flavored [`std::io::Error`]: retried iff
//!    it reports itself temporary or a timeout
//! 4. Anything else: retried iff the rendered chain contains one of the
//!    configured phrases (case-insensitive)

use std::error::Error as StdError;
use std::io;
use thiserror::Error;

use super::config::RetryConfig;

/// An upstream HTTP response with a non-success status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("HTTP {status}: {reason} (URL: {url})")]
pub struct HttpError {
    pub status: u16,
    pub reason: String,
    pub url: String,
}

impl HttpError {
    pub fn new(status: u16, reason: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            url: url.into(),
        }
    }
}

/// A connection-level failure that knows whether it is transient
#[derive(Debug, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
    temporary: bool,
    timeout: bool,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl TransportError {
    /// A failure expected to clear up on its own (connection reset, refused, ...)
    pub fn temporary(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            temporary: true,
            timeout: false,
            source: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            temporary: false,
            timeout: true,
            source: None,
        }
    }

    /// A failure that will not change on retry (bad certificate, unreachable config)
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            temporary: false,
            timeout: false,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout
    }
}

/// Wraps the failure of a request to `url`; classification looks through it
#[derive(Debug, Error)]
#[error("fetch {url}: {source}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub source: Box<dyn StdError + Send + Sync>,
}

impl FetchError {
    pub fn new(url: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            url: url.into(),
            source: Box::new(source),
        }
    }
}

/// Marker an operation returns when it observed cancellation itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct OperationCancelled;

/// Iterate an error and all of its causes
fn chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&e| e.source())
}

/// Render the error together with every cause, `outer: inner: root`
pub fn render_chain(error: &(dyn StdError + 'static)) -> String {
    chain(error)
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

fn is_cancellation(error: &(dyn StdError + 'static)) -> bool {
    error.is::<OperationCancelled>() || error.is::<tokio::time::error::Elapsed>()
}

/// Verdict for I/O errors that clearly describe the network; `None` for the rest
fn io_verdict(error: &io::Error) -> Option<bool> {
    use io::ErrorKind::*;

    match error.kind() {
        TimedOut | ConnectionReset | ConnectionAborted | ConnectionRefused | NotConnected
        | BrokenPipe | Interrupted | WouldBlock => Some(true),
        AddrInUse | AddrNotAvailable => Some(false),
        _ => None,
    }
}

/// Retry classifier configured with statuses and phrases
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    retriable_statuses: Vec<u16>,
    retriable_phrases: Vec<String>,
}

impl ErrorClassifier {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            retriable_statuses: config.retriable_statuses.clone(),
            retriable_phrases: config
                .retriable_errors
                .iter()
                .map(|phrase| phrase.to_lowercase())
                .collect(),
        }
    }

    /// Whether another attempt could plausibly succeed
    pub fn is_retriable(&self, error: &(dyn StdError + 'static)) -> bool {
        if chain(error).any(is_cancellation) {
            return false;
        }

        if let Some(http) = chain(error).find_map(|e| e.downcast_ref::<HttpError>()) {
            return self.retriable_statuses.contains(&http.status);
        }

        if let Some(transport) = chain(error).find_map(|e| e.downcast_ref::<TransportError>()) {
            return transport.is_temporary() || transport.is_timeout();
        }

        if let Some(verdict) = chain(error)
            .filter_map(|e| e.downcast_ref::<io::Error>())
            .find_map(io_verdict)
        {
            return verdict;
        }

        let message = render_chain(error).to_lowercase();
        self.retriable_phrases
            .iter()
            .any(|phrase| message.contains(phrase.as_str()))
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
