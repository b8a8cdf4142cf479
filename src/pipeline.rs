//! Pipeline stages over files: merge, goodbye, stats, and all three at once.
//!
//! ```text
//! sources ──merge──▶ merged.jsonl ──goodbye──▶ final.jsonl ──stats──▶ Summary
//! ```
//!
//! Every stage writes through [`LogWriter`], so a failed stage leaves no
//! output behind for the next one to pick up.

use std::path::Path;

use jiff::SignedDuration;
use tempfile::TempDir;

use crate::config::Config;
use crate::error::Result;
use crate::eventlog::{EventReader, LogWriter};
use crate::goodbye::{self, GoodbyeReport};
use crate::merge::Merge;
use crate::source::SourceSpec;
use crate::stats::{self, Summary};

/// Merge `sources` into `out`. Earlier sources win timestamp ties.
pub fn merge_to_file(sources: &[SourceSpec], out: &Path, verify_order: bool) -> Result<u64> {
    let producers = sources
        .iter()
        .map(SourceSpec::open)
        .collect::<Result<Vec<_>>>()?;

    let mut writer = LogWriter::create(out)?;
    for event in Merge::new(producers).verify_order(verify_order) {
        writer.write_event(&event?)?;
    }
    let written = writer.commit()?;

    tracing::info!(
        sources = sources.len(),
        events = written,
        out = %out.display(),
        "merge complete"
    );
    Ok(written)
}

/// Aggregate a finalized log.
pub fn stats_from_file(input: &Path, threshold: SignedDuration) -> Result<Summary> {
    stats::aggregate(EventReader::open(input)?, threshold)
}

/// What a full pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub merged: u64,
    pub goodbye: GoodbyeReport,
    pub summary: Summary,
}

/// Merge, add goodbyes, and aggregate in one go.
///
/// The merged intermediate lives in a scratch directory that is removed on
/// return, success or not.
pub fn run(sources: &[SourceSpec], out: &Path, config: &Config) -> Result<PipelineReport> {
    let scratch = match &config.staging_dir {
        Some(dir) => TempDir::new_in(dir)?,
        None => TempDir::new()?,
    };
    let merged_path = scratch.path().join("merged.jsonl");

    let merged = merge_to_file(sources, &merged_path, config.verify_source_order)?;
    let goodbye = goodbye::synthesize(&merged_path, out, &config.goodbye_options())?;
    let summary = stats_from_file(out, config.session_threshold())?;

    Ok(PipelineReport {
        merged,
        goodbye,
        summary,
    })
}
