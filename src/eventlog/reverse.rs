//! Reverse line reading with bounded memory.
//!
//! Reads fixed-size blocks from the end of a file toward the start, splitting
//! each block on `\n`. A line that straddles a block boundary is reassembled
//! from the carried-over fragment. Memory stays at one block plus the longest
//! line, regardless of file size.

use std::io::{self, Read, Seek, SeekFrom};

/// Iterates the lines of a seekable reader from last to first.
///
/// Line content excludes the `\n` terminator. A single trailing terminator at
/// end of file does not produce an empty final line; a file without one still
/// yields its last line. Interior empty lines are preserved.
pub struct ReverseLines<R> {
    reader: R,
    block_size: usize,

    /// Bytes `[0, pos)` are still unread.
    pos: u64,

    /// Whether the block at end of file has been read yet.
    read_tail: bool,

    /// Tail of a line whose start lies in unread bytes.
    carry: Option<Vec<u8>>,

    /// Complete lines from the current block; the next one is at the end.
    ready: Vec<Vec<u8>>,

    failed: bool,
}

impl<R: Read + Seek> ReverseLines<R> {
    pub fn new(mut reader: R, block_size: usize) -> io::Result<Self> {
        let pos = reader.seek(SeekFrom::End(0))?;
        Ok(Self {
            reader,
            block_size: block_size.max(1),
            pos,
            read_tail: false,
            carry: None,
            ready: Vec::new(),
            failed: false,
        })
    }

    /// Read the block just before `pos` and split it into lines.
    fn read_block(&mut self) -> io::Result<()> {
        let len = self.pos.min(self.block_size as u64);
        self.pos -= len;

        // `len` is at most `block_size`, so it fits in usize.
        let mut block = vec![0; usize::try_from(len).unwrap_or(self.block_size)];
        self.reader.seek(SeekFrom::Start(self.pos))?;
        self.reader.read_exact(&mut block)?;

        if !self.read_tail {
            self.read_tail = true;
            if block.last() == Some(&b'\n') {
                block.pop();
            }
        }

        let mut pieces: Vec<&[u8]> = block.split(|b| *b == b'\n').collect();

        // The block's last piece continues into the carried fragment.
        let tail = pieces.pop().unwrap_or_default();
        let mut joined = tail.to_vec();
        if let Some(carry) = self.carry.take() {
            joined.extend_from_slice(&carry);
        }

        if pieces.is_empty() {
            // No terminator in this block: the line keeps extending leftward.
            self.carry = Some(joined);
            return Ok(());
        }

        // pieces[0] may continue into the previous block; the rest are whole.
        self.carry = Some(pieces[0].to_vec());
        self.ready.extend(pieces[1..].iter().map(|p| p.to_vec()));
        self.ready.push(joined);
        Ok(())
    }

    fn next_bytes(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(line) = self.ready.pop() {
                return Ok(Some(line));
            }
            if self.pos == 0 {
                return Ok(self.carry.take());
            }
            self.read_block()?;
        }
    }
}

impl<R: Read + Seek> Iterator for ReverseLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let result = self.next_bytes().and_then(|line| {
            line.map(|bytes| {
                String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            })
            .transpose()
        });
        match result {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
