//! # Models
//!
//! Plain data types shared by every layer: calendar events, alarms and the
//! notifications derived from them.

pub mod event;
pub mod notification;

pub use event::{Alarm, Event, ResponseStatus};
pub use notification::Notification;
