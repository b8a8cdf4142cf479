//! Event log files: reading, reverse reading, and atomic writing.
//!
//! A log file is UTF-8 text with one JSON event per line:
//!
//! ```text
//! out.jsonl                        # final log, renamed into place on success
//! .registry-log-XXXXXX.partial     # in-progress output beside it, removed on failure
//! ```
//!
//! Readers skip blank lines. Writers never expose a partial file at the
//! destination path.

mod reader;
mod reverse;
mod writer;

pub use reader::EventReader;
pub use reverse::ReverseLines;
pub use writer::{LogWriter, write_atomic};

/// Default block size for reverse reads.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;
