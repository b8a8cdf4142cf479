//! Event timestamps: an instant plus the UTC offset it was recorded in.

use std::{fmt, str::FromStr};

use jiff::{
    SignedDuration, Timestamp, Zoned,
    fmt::strtime,
    tz::{Offset, TimeZone},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Canonical on-disk form: RFC 3339 with an explicit `±HH:MM` offset.
const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%:z";

/// RFC 3339 date and time with a basic `±HHMM` offset.
const BASIC_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Form written by the first-generation extractors: `2021-03-01 12:00:00.0 +0000`.
const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// When an event happened, with the offset it was recorded in.
///
/// Equality compares the offset too, so a decoded event equals the one that
/// was encoded. Ordering across events uses [`EventTime::instant`] only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventTime {
    instant: Timestamp,
    offset: Offset,
}

impl EventTime {
    pub fn new(instant: Timestamp, offset: Offset) -> Self {
        Self { instant, offset }
    }

    /// An instant recorded in UTC.
    pub fn utc(instant: Timestamp) -> Self {
        Self::new(instant, Offset::UTC)
    }

    /// The absolute point in time. This is what merge and sessions order by.
    pub fn instant(&self) -> Timestamp {
        self.instant
    }

    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// The instant as civil time in the recorded offset.
    pub fn zoned(&self) -> Zoned {
        self.instant.to_zoned(TimeZone::fixed(self.offset()))
    }

    /// `(ISO weekday 1-7, hour 0-23)` in the recorded offset's civil time.
    pub fn hour_of_week(&self) -> (u8, u8) {
        let zoned = self.zoned();
        let weekday = zoned.weekday().to_monday_one_offset().unsigned_abs();
        let hour = zoned.hour().unsigned_abs();
        (weekday, hour)
    }

    /// Signed time elapsed from `earlier` to `self`.
    pub fn since(&self, earlier: &EventTime) -> SignedDuration {
        self.instant.duration_since(earlier.instant)
    }
}

/// Why a timestamp string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp {input:?}: {reason}")]
pub struct TimestampError {
    input: String,
    reason: String,
}

impl FromStr for EventTime {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| TimestampError {
            input: s.to_string(),
            reason,
        };

        // `Z` names UTC without a numeric offset.
        if s.ends_with(['Z', 'z']) {
            let instant: Timestamp = s.parse::<Timestamp>().map_err(|e| invalid(e.to_string()))?;
            return Ok(Self::utc(instant));
        }

        // Other forms are fallbacks, so a failure reports the canonical error.
        let parsed = strtime::parse(CANONICAL_FORMAT, s)
            .or_else(|canonical| {
                strtime::parse(BASIC_OFFSET_FORMAT, s)
                    .or_else(|_| strtime::parse(LEGACY_FORMAT, s))
                    .map_err(|_| canonical)
            })
            .map_err(|e| invalid(format!("expected {CANONICAL_FORMAT}: {e}")))?;

        let Some(offset) = parsed.offset() else {
            return Err(invalid("missing UTC offset".to_string()));
        };
        let instant = parsed.to_timestamp().map_err(|e| invalid(e.to_string()))?;

        Ok(Self { instant, offset })
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.zoned().strftime(CANONICAL_FORMAT))
    }
}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
