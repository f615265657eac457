//! # Shared Constants
//!
//! Defaults and fixed vocabularies shared by the coordinator, scheduler and
//! resilience layers.

use std::time::Duration;

/// Severity assigned to alarms and notifications that do not carry one
pub const DEFAULT_SEVERITY: &str = "normal";

/// Delivery method used for synthesized alarms
pub const DEFAULT_ALARM_METHOD: &str = "popup";

/// How long a finished event is kept before cleanup removes it
pub const EVENT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Interval of the service-level cleanup sweep
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Merge strategy key consulted by the coordinator
pub const DEFAULT_MERGE_STRATEGY_KEY: &str = "default";

/// Prefix of identifiers produced by merging duplicate events
pub const MERGED_ID_PREFIX: &str = "merged-";

/// Error phrases that mark an otherwise unclassified failure as retriable
pub const DEFAULT_RETRIABLE_PHRASES: &[&str] = &[
    "connection refused",
    "timeout",
    "temporary failure",
    "network unreachable",
    "no such host",
    "connection reset",
];

/// HTTP status codes worth retrying
pub const DEFAULT_RETRIABLE_STATUSES: &[u16] = &[408, 429, 500, 502, 503, 504];

/// Calendar provider types understood by the configuration layer
pub mod provider_types {
    pub const CALDAV: &str = "caldav";
    pub const ICAL: &str = "ical";
    pub const GOOGLE: &str = "google";

    pub const ALL: &[&str] = &[CALDAV, ICAL, GOOGLE];
}
