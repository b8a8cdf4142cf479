//! Event sources: adapters that turn input files into merge producers.
//!
//! Each source is named on the command line as `<kind>:<path>`:
//!
//! - `events:<path>` (or a bare path): canonical JSONL, `.zst` decompressed
//! - `csv:<path>`: `user,package,timestamp` download rows
//! - `csv-anon:<path>`: same, hashing the raw user column
//!
//! Every source must already be in non-decreasing timestamp order.

mod csv;

use std::{fmt, fs, io, path::PathBuf, str::FromStr};

use crate::error::{Error, Result};
use crate::eventlog::EventReader;
use crate::merge::Producer;

pub use csv::DownloadsCsv;

/// The format of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Events,
    DownloadsCsv { anonymize: bool },
}

/// A source file and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub path: PathBuf,
}

impl SourceSpec {
    /// Open the file as a merge producer named after its path.
    pub fn open(&self) -> Result<Producer<'static>> {
        let name = self.path.display().to_string();
        let producer = match self.kind {
            SourceKind::Events => Producer::new(name, EventReader::open(&self.path)?),
            SourceKind::DownloadsCsv { anonymize } => {
                let file = io::BufReader::new(fs::File::open(&self.path)?);
                Producer::new(name.clone(), DownloadsCsv::new(name, file, anonymize))
            }
        };
        tracing::debug!(source = %self, "opened source");
        Ok(producer)
    }
}

impl FromStr for SourceSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, path) = match s.split_once(':') {
            Some(("events", path)) => (SourceKind::Events, path),
            Some(("csv", path)) => (SourceKind::DownloadsCsv { anonymize: false }, path),
            Some(("csv-anon", path)) => (SourceKind::DownloadsCsv { anonymize: true }, path),
            Some((kind, _)) if !kind.contains(['/', '\\', '.']) && kind.len() > 1 => {
                return Err(Error::InvalidConfiguration(format!(
                    "unknown source kind '{kind}' in '{s}' (expected events, csv or csv-anon)"
                )));
            }
            _ => (SourceKind::Events, s),
        };
        if path.is_empty() {
            return Err(Error::InvalidConfiguration(format!("source '{s}' has no path")));
        }
        Ok(Self {
            kind,
            path: PathBuf::from(path),
        })
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            SourceKind::Events => "events",
            SourceKind::DownloadsCsv { anonymize: false } => "csv",
            SourceKind::DownloadsCsv { anonymize: true } => "csv-anon",
        };
        write!(f, "{kind}:{}", self.path.display())
    }
}
