//! Core data model for registry logs.
//!
//! A log is a sequence of [`Event`]s, one JSON object per line:
//!
//! ```text
//! {"timestamp":"2021-03-01T12:00:00+00:00","action":{"Download":{"user":"u1","package":{"id":"libc"}}}}
//! ```

mod action;
mod package;
mod time;
mod user;

use serde::{Deserialize, Serialize};

pub use action::Action;
pub use package::{PackageId, PackageRef};
pub use time::EventTime;
pub use user::UserId;

/// A single registry activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: EventTime,
    pub action: Action,
}

impl Event {
    pub fn new(timestamp: EventTime, action: Action) -> Self {
        Self { timestamp, action }
    }

    /// Decode one log line.
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Encode as one log line, without the trailing newline.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
