//! Forward event reading.

use std::{
    fs,
    io::{self, BufRead},
    path::Path,
};

use crate::error::{MalformedEventError, Result};
use crate::model::Event;

/// Streams events from a log, one line at a time.
///
/// Stops after the first error: a log is either readable end to end or not.
pub struct EventReader<R> {
    origin: String,
    lines: io::Lines<R>,
    line_no: u64,
    failed: bool,
}

impl<R: BufRead> EventReader<R> {
    /// Read events from `reader`, labelling errors with `origin`.
    pub fn new(origin: impl Into<String>, reader: R) -> Self {
        Self {
            origin: origin.into(),
            lines: reader.lines(),
            line_no: 0,
            failed: false,
        }
    }
}

impl EventReader<Box<dyn BufRead>> {
    /// Open a log file. Paths ending in `.zst` are decompressed on the fly.
    pub fn open(path: &Path) -> Result<Self> {
        let file = fs::File::open(path)?;
        let reader: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "zst") {
            Box::new(io::BufReader::new(zstd::Decoder::new(file)?))
        } else {
            Box::new(io::BufReader::new(file))
        };
        Ok(Self::new(path.display().to_string(), reader))
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
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
            if line.trim().is_empty() {
                continue;
            }
            return match Event::decode(&line) {
                Ok(event) => Some(Ok(event)),
                Err(e) => {
                    self.failed = true;
                    let location = format!("{}:{}", self.origin, self.line_no);
                    Some(Err(MalformedEventError::new(location, e).into()))
                }
            };
        }
    }
}
