//! Trimming: cut a snapshot and an event log down to the popular packages.
//!
//! Useful for producing small, realistic test inputs from full registry
//! dumps. Packages are ranked by how often they appear in the initial
//! snapshot; the event log keeps only events about the kept packages.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use crate::error::Result;
use crate::eventlog::{EventReader, LogWriter};
use crate::model::PackageId;

/// Limits for a trim run. `None` means no limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimOptions {
    /// How many distinct packages to keep.
    pub num_packages: Option<usize>,

    /// How many event-log events to keep (after package filtering).
    pub num_entries: Option<usize>,
}

/// Paths for one trim run.
#[derive(Debug, Clone, Copy)]
pub struct TrimPaths<'a> {
    pub input_initial: &'a Path,
    pub input_events: &'a Path,
    pub output_initial: &'a Path,
    pub output_events: &'a Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimReport {
    pub packages_kept: usize,
    pub initial_written: u64,
    pub events_written: u64,
}

/// Write trimmed copies of the initial snapshot and the event log.
///
/// Events without a package (metadata refreshes, goodbyes) are dropped.
/// Neither output appears unless both are complete.
pub fn trim(paths: TrimPaths<'_>, options: TrimOptions) -> Result<TrimReport> {
    let keep = top_packages(paths.input_initial, options.num_packages)?;

    let mut initial_out = LogWriter::create(paths.output_initial)?;
    for event in EventReader::open(paths.input_initial)? {
        let event = event?;
        if event.action.package().is_some_and(|p| keep.contains(&p.id)) {
            initial_out.write_event(&event)?;
        }
    }

    let limit = options.num_entries.unwrap_or(usize::MAX);
    let mut events_out = LogWriter::create(paths.output_events)?;
    let mut kept = 0;
    for event in EventReader::open(paths.input_events)? {
        if kept >= limit {
            break;
        }
        let event = event?;
        if event.action.package().is_some_and(|p| keep.contains(&p.id)) {
            events_out.write_event(&event)?;
            kept += 1;
        }
    }

    let report = TrimReport {
        packages_kept: keep.len(),
        initial_written: initial_out.commit()?,
        events_written: events_out.commit()?,
    };
    tracing::info!(
        packages = report.packages_kept,
        initial = report.initial_written,
        events = report.events_written,
        "trim complete"
    );
    Ok(report)
}

/// The `limit` most frequent package ids in `path`, ties broken by id.
fn top_packages(path: &Path, limit: Option<usize>) -> Result<HashSet<PackageId>> {
    let mut counts: HashMap<PackageId, u64> = HashMap::new();
    for event in EventReader::open(path)? {
        if let Some(package) = event?.action.package() {
            *counts.entry(package.id.clone()).or_default() += 1;
        }
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|(a_id, a_count), (b_id, b_count)| b_count.cmp(a_count).then(a_id.cmp(b_id)));
    Ok(ranked
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|(id, _)| id)
        .collect())
}
