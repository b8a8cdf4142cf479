//! Usage statistics: download counters and global sessions in one pass.
//!
//! Sessions are tracked on one timeline shared by all users. A session opens
//! at a download and absorbs every later download no more than `threshold`
//! after that opening download; the first download past it opens the next
//! session. Only `Download` events count; everything else is skipped.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use jiff::SignedDuration;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::model::{Action, Event, EventTime, PackageId, UserId};

/// Default session threshold: one minute.
pub const DEFAULT_SESSION_THRESHOLD: SignedDuration = SignedDuration::from_secs(60);

/// A `(ISO weekday, hour)` bucket: 168 per week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourOfWeek {
    /// 1 (Monday) through 7 (Sunday).
    pub weekday: u8,

    /// 0 through 23.
    pub hour: u8,
}

impl HourOfWeek {
    pub fn of(time: &EventTime) -> Self {
        let (weekday, hour) = time.hour_of_week();
        Self { weekday, hour }
    }
}

impl fmt::Display for HourOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.weekday, self.hour)
    }
}

impl Serialize for HourOfWeek {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything one pass over a log produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub downloads_count: u64,
    pub sessions_count: u64,

    /// Non-download events seen and skipped.
    pub events_ignored: u64,

    /// Timestamp of the first download.
    pub start_time: Option<EventTime>,

    /// Timestamp of the last download.
    pub end_time: Option<EventTime>,

    pub downloads_by_package: BTreeMap<PackageId, u64>,
    pub downloads_by_user: BTreeMap<UserId, u64>,
    pub downloads_by_hour: BTreeMap<HourOfWeek, u64>,

    /// Number of sessions each user took part in.
    pub sessions_by_user: BTreeMap<UserId, u64>,

    /// Sessions by the bucket of their first download.
    pub sessions_by_hour: BTreeMap<HourOfWeek, u64>,

    /// Session size (downloads) to number of sessions of that size.
    pub sessions_by_count: BTreeMap<u64, u64>,
}

/// The session currently absorbing downloads.
struct OpenSession {
    start: EventTime,
    downloads: u64,
    users: HashSet<UserId>,
}

/// Single-pass accumulator over a finalized log.
pub struct Aggregator {
    threshold: SignedDuration,
    summary: Summary,
    session: Option<OpenSession>,
}

impl Aggregator {
    /// Fails with [`Error::InvalidConfiguration`] for a non-positive threshold.
    pub fn new(threshold: SignedDuration) -> Result<Self> {
        if threshold <= SignedDuration::ZERO {
            return Err(Error::InvalidConfiguration(format!(
                "session threshold must be positive, got {threshold:?}"
            )));
        }
        Ok(Self {
            threshold,
            summary: Summary::default(),
            session: None,
        })
    }

    pub fn observe(&mut self, event: &Event) {
        match &event.action {
            Action::Download { user, package } => {
                self.observe_download(&event.timestamp, user, &package.id);
            }
            Action::Publish { .. } | Action::RefreshMetadata { .. } | Action::Goodbye { .. } => {
                self.summary.events_ignored += 1;
            }
        }
    }

    fn observe_download(&mut self, at: &EventTime, user: &UserId, package: &PackageId) {
        let bucket = HourOfWeek::of(at);

        let expired = self
            .session
            .as_ref()
            .is_none_or(|s| at.since(&s.start) > self.threshold);
        if expired {
            self.close_session();
            self.session = Some(OpenSession {
                start: *at,
                downloads: 0,
                users: HashSet::new(),
            });
            self.summary.sessions_count += 1;
            *self.summary.sessions_by_hour.entry(bucket).or_default() += 1;
        }

        let summary = &mut self.summary;
        summary.downloads_count += 1;
        *summary.downloads_by_package.entry(package.clone()).or_default() += 1;
        *summary.downloads_by_user.entry(user.clone()).or_default() += 1;
        *summary.downloads_by_hour.entry(bucket).or_default() += 1;
        summary.start_time.get_or_insert(*at);
        summary.end_time = Some(*at);

        if let Some(session) = self.session.as_mut() {
            session.downloads += 1;
            if session.users.insert(user.clone()) {
                *summary.sessions_by_user.entry(user.clone()).or_default() += 1;
            }
        }
    }

    /// Commit the open session's size, if there is one.
    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            *self
                .summary
                .sessions_by_count
                .entry(session.downloads)
                .or_default() += 1;
        }
    }

    /// Flush the open session and return the totals.
    pub fn finish(mut self) -> Summary {
        self.close_session();
        self.summary
    }
}

/// Aggregate a whole event stream, stopping at the first error.
pub fn aggregate(
    events: impl Iterator<Item = Result<Event>>,
    threshold: SignedDuration,
) -> Result<Summary> {
    let mut aggregator = Aggregator::new(threshold)?;
    for event in events {
        aggregator.observe(&event?);
    }
    let summary = aggregator.finish();
    tracing::info!(
        downloads = summary.downloads_count,
        sessions = summary.sessions_count,
        ignored = summary.events_ignored,
        "aggregation complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    use crate::error::MalformedEventError;
    use crate::model::PackageRef;

    /// 2021-03-01T00:00:00Z, a Monday.
    const MONDAY: i64 = 1_614_556_800;

    fn at(secs: i64) -> EventTime {
        EventTime::utc(Timestamp::UNIX_EPOCH + SignedDuration::from_secs(MONDAY + secs))
    }

    fn download(secs: i64, user: &str, package: &str) -> Event {
        Event::new(
            at(secs),
            Action::Download {
                user: UserId::new(user),
                package: PackageRef::new(PackageId::new(package), None),
            },
        )
    }

    fn run(events: Vec<Event>) -> Summary {
        aggregate(events.into_iter().map(Ok), DEFAULT_SESSION_THRESHOLD).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    #[test]
    fn empty_input_is_all_zero() {
        let summary = run(vec![]);
        assert_eq!(summary, Summary::default());
        assert_eq!(summary.sessions_count, 0);
        assert!(summary.sessions_by_count.is_empty());
    }

    #[test]
    fn single_download_is_one_session_of_one() {
        let summary = run(vec![download(0, "u", "p")]);
        assert_eq!(summary.sessions_count, 1);
        assert_eq!(summary.sessions_by_count, BTreeMap::from([(1, 1)]));
        assert_eq!(summary.sessions_by_user, BTreeMap::from([(user("u"), 1)]));
    }

    #[test]
    fn gap_measured_from_session_start() {
        let summary = run(vec![
            download(0, "u", "p"),
            download(30, "u", "p"),
            download(91, "u", "p"),
        ]);

        assert_eq!(summary.sessions_count, 2);
        assert_eq!(summary.sessions_by_count, BTreeMap::from([(2, 1), (1, 1)]));
        assert_eq!(summary.downloads_by_user[&user("u")], 3);
        assert_eq!(summary.sessions_by_user[&user("u")], 2);
        assert_eq!(summary.downloads_count, 3);
    }

    #[test]
    fn download_exactly_at_threshold_stays_in_session() {
        let summary = run(vec![download(0, "u", "p"), download(60, "u", "p")]);
        assert_eq!(summary.sessions_by_count, BTreeMap::from([(2, 1)]));
    }

    #[test]
    fn sessions_are_global_across_users() {
        let summary = run(vec![
            download(0, "alice", "p"),
            download(10, "bob", "q"),
            download(20, "alice", "q"),
            download(200, "bob", "p"),
        ]);

        assert_eq!(summary.sessions_count, 2);
        assert_eq!(summary.sessions_by_count, BTreeMap::from([(3, 1), (1, 1)]));
        assert_eq!(summary.sessions_by_user[&user("alice")], 1);
        assert_eq!(summary.sessions_by_user[&user("bob")], 2);
        assert_eq!(summary.downloads_by_package[&PackageId::new("p")], 2);
        assert_eq!(summary.downloads_by_package[&PackageId::new("q")], 2);
    }

    #[test]
    fn hour_buckets_count_downloads_and_session_starts() {
        let summary = run(vec![
            download(9 * 3600, "u", "p"),
            download(9 * 3600 + 30, "u", "p"),
            // Tuesday 10:00.
            download(86_400 + 10 * 3600, "u", "p"),
        ]);

        let monday_nine = HourOfWeek { weekday: 1, hour: 9 };
        let tuesday_ten = HourOfWeek { weekday: 2, hour: 10 };
        assert_eq!(
            summary.downloads_by_hour,
            BTreeMap::from([(monday_nine, 2), (tuesday_ten, 1)])
        );
        assert_eq!(
            summary.sessions_by_hour,
            BTreeMap::from([(monday_nine, 1), (tuesday_ten, 1)])
        );
    }

    #[test]
    fn non_downloads_are_ignored() {
        let summary = run(vec![
            Event::new(at(0), Action::RefreshMetadata { user: user("u") }),
            download(5, "u", "p"),
            Event::new(at(5), Action::Goodbye { user: user("u") }),
            Event::new(
                at(500),
                Action::Publish {
                    package: PackageRef::new(PackageId::new("p"), None),
                },
            ),
        ]);

        assert_eq!(summary.events_ignored, 3);
        assert_eq!(summary.downloads_count, 1);
        assert_eq!(summary.sessions_by_count, BTreeMap::from([(1, 1)]));
        assert_eq!(summary.start_time, Some(at(5)));
        assert_eq!(summary.end_time, Some(at(5)));
    }

    #[test]
    fn start_and_end_track_downloads() {
        let summary = run(vec![download(1, "u", "p"), download(500, "v", "p")]);
        assert_eq!(summary.start_time, Some(at(1)));
        assert_eq!(summary.end_time, Some(at(500)));
    }

    #[test]
    fn rejects_non_positive_threshold() {
        assert!(matches!(
            Aggregator::new(SignedDuration::ZERO),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(Aggregator::new(SignedDuration::from_secs(-5)).is_err());
    }

    #[test]
    fn custom_threshold_splits_sessions() {
        let events = vec![download(0, "u", "p"), download(10, "u", "p")];
        let summary =
            aggregate(events.into_iter().map(Ok), SignedDuration::from_secs(5)).unwrap();
        assert_eq!(summary.sessions_count, 2);
    }

    #[test]
    fn aggregation_stops_on_error() {
        let events = vec![
            Ok(download(0, "u", "p")),
            Err(MalformedEventError::new("log:2", "bad").into()),
        ];
        let err = aggregate(events.into_iter(), DEFAULT_SESSION_THRESHOLD).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn summary_serializes_with_string_keys() {
        let summary = run(vec![download(9 * 3600, "u", "p")]);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["downloads_by_hour"]["1-09"], 1);
        assert_eq!(json["sessions_by_count"]["1"], 1);
        assert_eq!(json["downloads_by_user"]["u"], 1);
        assert_eq!(json["start_time"], "2021-03-01T09:00:00+00:00");
    }
}
