//! Goodbye synthesis: mark each user's last download.
//!
//! A user's last download is the first one seen when scanning a log from the
//! end. The scan runs in two reverse passes so neither needs the log in
//! memory:
//!
//! 1. Reverse-read the input. Before each user's first-seen (that is, last)
//!    download, write a `Goodbye` with the same timestamp to a staging file,
//!    then copy the original line. The staging file is in reverse order.
//! 2. Reverse-read the staging file into the output, restoring chronological
//!    order. Each `Goodbye` now sits immediately after its download.
//!
//! Memory is one block plus the longest line, plus the set of users already
//! seen. Disk use is one extra copy of the log, removed on every exit path.

use std::{
    collections::HashSet,
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::{MalformedEventError, Result};
use crate::eventlog::{DEFAULT_BLOCK_SIZE, LogWriter, ReverseLines};
use crate::model::{Action, Event, UserId};

/// Settings for one synthesis run.
#[derive(Debug, Clone)]
pub struct GoodbyeOptions {
    /// Bytes read per reverse step.
    pub block_size: usize,

    /// Directory for the staging file. System temp dir when unset.
    pub staging_dir: Option<PathBuf>,
}

impl Default for GoodbyeOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            staging_dir: None,
        }
    }
}

/// What a synthesis run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GoodbyeReport {
    /// Events read from the input.
    pub events: u64,

    /// `Goodbye` events added, one per downloading user.
    pub goodbyes: u64,
}

/// Write `input` to `output` with a `Goodbye` after each user's last download.
///
/// `output` appears only if the whole run succeeds.
pub fn synthesize(input: &Path, output: &Path, options: &GoodbyeOptions) -> Result<GoodbyeReport> {
    let staging = match &options.staging_dir {
        Some(dir) => NamedTempFile::new_in(dir)?,
        None => NamedTempFile::new()?,
    };
    tracing::debug!(staging = %staging.path().display(), "staging goodbye pass");

    let origin = input.display().to_string();
    let report = mark_last_downloads(
        &origin,
        ReverseLines::new(fs::File::open(input)?, options.block_size)?,
        &mut BufWriter::new(staging.as_file()),
    )?;

    let mut writer = LogWriter::create(output)?;
    for line in ReverseLines::new(staging.reopen()?, options.block_size)? {
        writer.write_line(&line?)?;
    }
    writer.commit()?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        events = report.events,
        goodbyes = report.goodbyes,
        "goodbye synthesis complete"
    );
    Ok(report)
}

/// First pass: copy reverse-ordered lines to `staging`, inserting a
/// `Goodbye` before each user's first-seen download.
fn mark_last_downloads(
    origin: &str,
    lines: impl Iterator<Item = io::Result<String>>,
    staging: &mut impl Write,
) -> Result<GoodbyeReport> {
    let mut closed: HashSet<UserId> = HashSet::new();
    let mut report = GoodbyeReport {
        events: 0,
        goodbyes: 0,
    };

    for (from_end, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let location = || format!("{origin} (line {} from end)", from_end + 1);

        let event = Event::decode(&line).map_err(|e| MalformedEventError::new(location(), e))?;
        report.events += 1;

        match &event.action {
            Action::Download { user, .. } if !closed.contains(user) => {
                let goodbye = Event::new(event.timestamp, Action::Goodbye { user: user.clone() });
                let encoded = goodbye.encode().map_err(io::Error::from)?;
                writeln!(staging, "{encoded}")?;
                closed.insert(user.clone());
                report.goodbyes += 1;
            }
            Action::Goodbye { .. } => {
                return Err(MalformedEventError::new(
                    location(),
                    "input already contains Goodbye events; they are only synthesized",
                )
                .into());
            }
            Action::Download { .. } | Action::Publish { .. } | Action::RefreshMetadata { .. } => {}
        }

        writeln!(staging, "{line}")?;
    }

    staging.flush()?;
    Ok(report)
}
