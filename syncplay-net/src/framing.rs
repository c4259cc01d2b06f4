//! Newline-delimited framing for the server command stream.
//!
//! Wire format: `<UTF-8 JSON object>\n`, one record per line. TCP read
//! boundaries are not record boundaries, so incoming bytes are accumulated
//! in a [`LineDecoder`] until a terminator arrives.

use std::fmt;
use std::io::{self, Write};

/// Default cap on a single partial record (64 KiB).
pub const DEFAULT_MAX_RECORD_LEN: usize = 64 * 1024;

const TERMINATOR: u8 = b'\n';

/// Error from feeding bytes into a [`LineDecoder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The unterminated tail of the buffer grew past the configured cap.
    Overflow { limit: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Overflow { limit } => {
                write!(f, "record exceeds {} bytes without a terminator", limit)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Accumulates raw bytes and yields complete, trimmed records.
///
/// Bytes between extractions never contain a terminator. Records are split
/// on the byte level before UTF-8 decoding, so a multi-byte character split
/// across two reads is reassembled intact.
#[derive(Debug)]
pub struct LineDecoder {
    buf: Vec<u8>,
    max_len: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_RECORD_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
        }
    }

    /// Append `bytes` and return every record completed by them, in arrival
    /// order. Records that trim to empty are dropped.
    ///
    /// On overflow the buffer is emptied and nothing from this call is
    /// returned; the caller is expected to drop the connection.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>, FrameError> {
        // Only the new bytes can contain a terminator.
        let mut scan_from = self.buf.len();
        self.buf.extend_from_slice(bytes);

        let mut records = Vec::new();
        while let Some(offset) = self.buf[scan_from..].iter().position(|&b| b == TERMINATOR) {
            let end = scan_from + offset;
            let line: Vec<u8> = self.buf.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                records.push(trimmed.to_string());
            }
            scan_from = 0;
        }

        if self.buf.len() > self.max_len {
            self.buf.clear();
            return Err(FrameError::Overflow {
                limit: self.max_len,
            });
        }

        Ok(records)
    }

    /// Number of bytes waiting for a terminator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop any partial record.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one record followed by the terminator.
pub fn write_record<W: Write>(writer: &mut W, record: &str) -> io::Result<()> {
    if record.as_bytes().contains(&TERMINATOR) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "record must not contain a newline",
        ));
    }

    writer.write_all(record.as_bytes())?;
    writer.write_all(&[TERMINATOR])?;
    writer.flush()?;

    Ok(())
}
