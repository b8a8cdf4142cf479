//! Stream merging: many time-ordered producers into one time-ordered log.
//!
//! A binary heap holds at most one pending event per producer, keyed by
//! `(instant, priority)`. Producers are pulled lazily, so memory stays
//! O(producers) however long the inputs are.
//!
//! Priority is the producer's position in the list given to [`Merge::new`]:
//! on equal timestamps the earlier producer's event comes first. Events from a
//! single producer always keep their relative order.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use jiff::Timestamp;

use crate::error::{Error, Result};
use crate::model::{Event, EventTime, UserId};

/// A named source of events in non-decreasing timestamp order.
pub struct Producer<'a> {
    name: String,
    events: Box<dyn Iterator<Item = Result<Event>> + 'a>,
    last: Option<EventTime>,
}

impl<'a> Producer<'a> {
    pub fn new(name: impl Into<String>, events: impl Iterator<Item = Result<Event>> + 'a) -> Self {
        Self {
            name: name.into(),
            events: Box::new(events),
            last: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pull the next event, checking it does not precede the previous one.
    fn pull(&mut self, verify_order: bool) -> Option<Result<Event>> {
        let event = match self.events.next()? {
            Ok(event) => event,
            Err(e) => return Some(Err(e)),
        };
        if verify_order
            && let Some(previous) = self.last
            && event.timestamp.instant() < previous.instant()
        {
            return Some(Err(Error::SourceOrderingViolation {
                producer: self.name.clone(),
                previous,
                found: event.timestamp,
            }));
        }
        self.last = Some(event.timestamp);
        Some(Ok(event))
    }
}

/// A producer's current head, ordered so the heap pops the earliest first.
struct Head {
    instant: Timestamp,
    priority: usize,
    event: Event,
}

impl Head {
    fn key(&self) -> Reverse<(Timestamp, usize)> {
        Reverse((self.instant, self.priority))
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Lazy k-way merge over producers.
///
/// Yields every input event exactly once in non-decreasing timestamp order.
/// The first producer error is yielded and ends the merge; output produced
/// up to that point is not a usable log.
pub struct Merge<'a> {
    producers: Vec<Producer<'a>>,
    heap: BinaryHeap<Head>,
    verify_order: bool,
    primed: bool,
    failed: bool,
}

impl<'a> Merge<'a> {
    /// Merge `producers`, earliest in the list winning timestamp ties.
    pub fn new(producers: Vec<Producer<'a>>) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(producers.len()),
            producers,
            verify_order: true,
            primed: false,
            failed: false,
        }
    }

    /// Whether to fail on a producer that goes back in time (on by default).
    #[must_use]
    pub fn verify_order(mut self, verify: bool) -> Self {
        self.verify_order = verify;
        self
    }

    /// Pull producer `priority`'s next event onto the heap.
    fn advance(&mut self, priority: usize) -> Result<()> {
        match self.producers[priority].pull(self.verify_order) {
            Some(Ok(event)) => {
                self.heap.push(Head {
                    instant: event.timestamp.instant(),
                    priority,
                    event,
                });
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => {
                tracing::debug!(producer = self.producers[priority].name(), "producer exhausted");
                Ok(())
            }
        }
    }

    fn step(&mut self) -> Result<Option<Event>> {
        if !self.primed {
            self.primed = true;
            for priority in 0..self.producers.len() {
                self.advance(priority)?;
            }
        }
        let Some(head) = self.heap.pop() else {
            return Ok(None);
        };
        tracing::trace!(
            producer = self.producers[head.priority].name(),
            kind = head.event.action.kind(),
            user = head.event.action.user().map(UserId::as_str),
            package = head.event.action.package().map(|p| p.id.as_str()),
            "emit"
        );
        self.advance(head.priority)?;
        Ok(Some(head.event))
    }
}

impl Iterator for Merge<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.step() {
            Ok(event) => event.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    use jiff::SignedDuration;
    use proptest::prelude::*;

    use crate::error::MalformedEventError;
    use crate::model::{Action, PackageId, PackageRef, UserId};

    fn at(secs: i64) -> EventTime {
        EventTime::utc(Timestamp::UNIX_EPOCH + SignedDuration::from_secs(secs))
    }

    fn publish(secs: i64, package: &str) -> Event {
        Event::new(
            at(secs),
            Action::Publish {
                package: PackageRef::new(PackageId::new(package), None),
            },
        )
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

    fn producer(name: &str, events: Vec<Event>) -> Producer<'static> {
        Producer::new(name, events.into_iter().map(Ok))
    }

    fn merge_all(producers: Vec<Producer<'_>>) -> Vec<Event> {
        Merge::new(producers).collect::<Result<_>>().unwrap()
    }

    #[test]
    fn interleaves_by_timestamp() {
        let a = producer("uploads", vec![publish(1, "p1"), publish(3, "p2")]);
        let b = producer("downloads", vec![download(2, "u1", "p1")]);

        let merged = merge_all(vec![a, b]);

        assert_eq!(
            merged,
            vec![publish(1, "p1"), download(2, "u1", "p1"), publish(3, "p2")]
        );
    }

    #[test]
    fn ties_favor_earlier_producer() {
        let uploads = vec![publish(5, "p1")];
        let downloads = vec![download(5, "u1", "p1")];

        let merged = merge_all(vec![
            producer("uploads", uploads.clone()),
            producer("downloads", downloads.clone()),
        ]);
        assert_eq!(merged, vec![publish(5, "p1"), download(5, "u1", "p1")]);

        let merged = merge_all(vec![producer("downloads", downloads), producer("uploads", uploads)]);
        assert_eq!(merged, vec![download(5, "u1", "p1"), publish(5, "p1")]);
    }

    #[test]
    fn same_producer_keeps_its_order_on_ties() {
        let merged = merge_all(vec![producer(
            "downloads",
            vec![download(1, "a", "p"), download(1, "b", "p"), download(1, "c", "p")],
        )]);
        let users: Vec<_> = merged
            .iter()
            .map(|e| e.action.user().unwrap().as_str().to_string())
            .collect();
        assert_eq!(users, ["a", "b", "c"]);
    }

    #[test]
    fn no_producers_or_empty_producers_yield_nothing() {
        assert!(merge_all(vec![]).is_empty());
        assert!(merge_all(vec![producer("a", vec![]), producer("b", vec![])]).is_empty());
    }

    #[test]
    fn orders_instants_across_offsets() {
        let plus_two: EventTime = "1970-01-01T02:00:10+02:00".parse().unwrap();
        let early = Event::new(plus_two, Action::RefreshMetadata { user: UserId::new("x") });
        let later = download(5, "u", "p");

        // 02:00:10+02:00 is 10s after the epoch, so it follows the 5s download.
        let merged = merge_all(vec![producer("a", vec![early.clone()]), producer("b", vec![later.clone()])]);
        assert_eq!(merged, vec![later, early]);
    }

    #[test]
    fn producer_error_aborts_merge() {
        let failing = Producer::new(
            "broken",
            vec![
                Ok(download(1, "u", "p")),
                Err(MalformedEventError::new("broken:2", "bad").into()),
                Ok(download(9, "u", "p")),
            ]
            .into_iter(),
        );
        let healthy = producer("ok", vec![publish(0, "p"), publish(5, "q")]);

        let mut merge = Merge::new(vec![failing, healthy]);
        assert!(merge.next().unwrap().is_ok());
        assert!(matches!(merge.next().unwrap(), Err(Error::Malformed(_))));
        assert!(merge.next().is_none());
    }

    #[test]
    fn io_errors_propagate() {
        let failing = Producer::new(
            "io",
            std::iter::once(Err(io::Error::other("disk gone").into())),
        );
        let result: Result<Vec<_>> = Merge::new(vec![failing]).collect();
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn detects_out_of_order_producer() {
        let bad = producer("bad", vec![download(5, "u", "p"), download(3, "u", "p")]);
        let result: Result<Vec<_>> = Merge::new(vec![bad]).collect();

        match result {
            Err(Error::SourceOrderingViolation { producer, previous, found }) => {
                assert_eq!(producer, "bad");
                assert_eq!(previous, at(5));
                assert_eq!(found, at(3));
            }
            other => panic!("expected ordering violation, got {other:?}"),
        }
    }

    #[test]
    fn ordering_check_can_be_disabled() {
        let bad = producer("bad", vec![download(5, "u", "p"), download(3, "u", "p")]);
        let merged: Vec<_> = Merge::new(vec![bad])
            .verify_order(false)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn reruns_are_byte_identical() {
        let inputs = || {
            vec![
                producer("a", vec![publish(1, "p"), publish(2, "q"), publish(2, "r")]),
                producer("b", vec![download(1, "u", "p"), download(2, "v", "q")]),
                producer("c", vec![download(2, "w", "r")]),
            ]
        };
        let encode = |events: Vec<Event>| {
            events
                .iter()
                .map(|e| e.encode().unwrap())
                .collect::<Vec<_>>()
                .join("\n")
        };
        assert_eq!(encode(merge_all(inputs())), encode(merge_all(inputs())));
    }

    proptest! {
        #[test]
        fn merged_output_is_sorted_permutation(
            streams in proptest::collection::vec(
                proptest::collection::vec(0i64..50, 0..15),
                1..5,
            )
        ) {
            let mut expected = Vec::new();
            let producers: Vec<_> = streams
                .iter()
                .enumerate()
                .map(|(p, times)| {
                    let mut times = times.clone();
                    times.sort_unstable();
                    let events: Vec<_> = times
                        .iter()
                        .enumerate()
                        .map(|(i, t)| download(*t, &format!("p{p}-{i}"), "pkg"))
                        .collect();
                    expected.extend(events.iter().cloned());
                    producer(&format!("p{p}"), events)
                })
                .collect();

            let merged = merge_all(producers);

            prop_assert!(merged
                .windows(2)
                .all(|w| w[0].timestamp.instant() <= w[1].timestamp.instant()));

            let key = |e: &Event| e.action.user().unwrap().as_str().to_string();
            let mut got: Vec<_> = merged.iter().map(key).collect();
            let mut want: Vec<_> = expected.iter().map(key).collect();
            got.sort();
            want.sort();
            prop_assert_eq!(got, want);
        }
    }
}
