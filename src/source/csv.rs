//! Download feeds as `user,package,timestamp` rows.
//!
//! Timestamps either carry an offset (`2021-03-01T00:00:05+02:00`) or are
//! civil datetimes (`2021-03-01T00:00:05.000000`) taken as UTC. An optional
//! `user,package,timestamp` header line is skipped.

use std::io::{self, BufRead};

use jiff::{civil::DateTime, tz::TimeZone};

use crate::error::{MalformedEventError, Result};
use crate::model::{Action, Event, EventTime, PackageId, PackageRef, UserId};

const HEADER: &str = "user,package,timestamp";

/// Streams `Download` events from CSV rows.
pub struct DownloadsCsv<R> {
    origin: String,
    lines: io::Lines<R>,
    line_no: u64,
    anonymize: bool,
    failed: bool,
}

impl<R: BufRead> DownloadsCsv<R> {
    /// With `anonymize`, the user column is hashed with [`UserId::anonymize`].
    pub fn new(origin: impl Into<String>, reader: R, anonymize: bool) -> Self {
        Self {
            origin: origin.into(),
            lines: reader.lines(),
            line_no: 0,
            anonymize,
            failed: false,
        }
    }

    fn parse_row(&self, row: &str) -> core::result::Result<Event, String> {
        let mut fields = row.split(',').map(str::trim);
        let (Some(user), Some(package), Some(timestamp), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(format!("expected 3 comma-separated fields, got {row:?}"));
        };
        if user.is_empty() || package.is_empty() {
            return Err("empty user or package".to_string());
        }

        let user = if self.anonymize {
            UserId::anonymize(user)
        } else {
            UserId::new(user)
        };
        Ok(Event::new(
            parse_timestamp(timestamp)?,
            Action::Download {
                user,
                package: PackageRef::new(PackageId::new(package), None),
            },
        ))
    }
}

fn parse_timestamp(s: &str) -> core::result::Result<EventTime, String> {
    if let Ok(time) = s.parse::<EventTime>() {
        return Ok(time);
    }
    let civil: DateTime = s.parse().map_err(|e| format!("invalid timestamp {s:?}: {e}"))?;
    let zoned = civil
        .to_zoned(TimeZone::UTC)
        .map_err(|e| format!("invalid timestamp {s:?}: {e}"))?;
    Ok(EventTime::utc(zoned.timestamp()))
}

impl<R: BufRead> Iterator for DownloadsCsv<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            };
            self.line_no += 1;
            let row = line.trim();
            if row.is_empty() || (self.line_no == 1 && row == HEADER) {
                continue;
            }
            return match self.parse_row(row) {
                Ok(event) => Some(Ok(event)),
                Err(reason) => {
                    self.failed = true;
                    let location = format!("{}:{}", self.origin, self.line_no);
                    Some(Err(MalformedEventError::new(location, reason).into()))
                }
            };
        }
    }
}
