//! Errors shared by every pipeline stage.
//!
//! Every error is fatal to the run that hit it. A log is either usable end to
//! end or not, so nothing here is retried or recovered locally.

use std::io;

use crate::model::EventTime;

/// A record that does not decode into a known event.
#[derive(Debug, thiserror::Error)]
#[error("malformed event at {location}: {reason}")]
pub struct MalformedEventError {
    /// Where the record came from, e.g. `downloads.jsonl:12`.
    pub location: String,
    pub reason: String,
}

impl MalformedEventError {
    pub fn new(location: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors that can occur while assembling or analyzing a log.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Malformed(#[from] MalformedEventError),

    #[error("producer {producer} went back in time: {found} after {previous}")]
    SourceOrderingViolation {
        producer: String,
        previous: EventTime,
        found: EventTime,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type Result<T> = core::result::Result<T, Error>;
