//! Atomic log writing.

use std::{
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use crate::error::Result;
use crate::model::Event;

/// Writes a log to a temporary file beside `dest` and renames it into place
/// on [`LogWriter::commit`].
///
/// Dropping the writer without committing removes the temporary file, so a
/// failed run never leaves anything at `dest` that a later stage could read.
pub struct LogWriter {
    out: BufWriter<NamedTempFile>,
    dest: PathBuf,
    lines: u64,
}

/// A temporary file in `dest`'s directory, so the final rename stays on one
/// filesystem.
fn partial_beside(dest: &Path) -> io::Result<NamedTempFile> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(".registry-log-")
        .suffix(".partial")
        .tempfile_in(dir)
}

/// Replace `dest` with `contents` in one step. A failed write leaves any
/// previous `dest` untouched.
pub fn write_atomic(dest: &Path, contents: &[u8]) -> Result<()> {
    let mut file = partial_beside(dest)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(dest).map_err(io::Error::from)?;
    Ok(())
}

impl LogWriter {
    pub fn create(dest: impl Into<PathBuf>) -> Result<Self> {
        let dest = dest.into();
        let file = partial_beside(&dest)?;
        Ok(Self {
            out: BufWriter::new(file),
            dest,
            lines: 0,
        })
    }

    pub fn write_event(&mut self, event: &Event) -> Result<()> {
        let line = event.encode().map_err(io::Error::from)?;
        self.write_line(&line)
    }

    /// Write a line verbatim, appending the terminator.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.out.write_all(line.as_bytes())?;
        self.out.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// Flush, sync and rename into place. Returns the number of lines written.
    pub fn commit(self) -> Result<u64> {
        let file = self.out.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.as_file().sync_all()?;
        file.persist(&self.dest).map_err(io::Error::from)?;
        tracing::debug!(dest = %self.dest.display(), lines = self.lines, "committed log");
        Ok(self.lines)
    }
}
