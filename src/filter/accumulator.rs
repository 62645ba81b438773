use std::fmt;

use super::buffer::{BoundedBuffer, Overflow};
use crate::logging::{log_debug, report_warning};

/// curl redraws its meter in place; every update ends at a carriage return.
pub const SYNC_BYTE: u8 = b'\r';

/// One complete line of producer output, without its delimiter.
#[derive(Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    bytes: Vec<u8>,
}

impl ProgressRecord {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgressRecord({:?})", String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Display for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

/// Reassembles `\r`-delimited records from reads that split the stream anywhere.
///
/// The state only depends on the bytes seen so far, never on where the reads were
/// cut, so any chunking of the same stream yields the same records.
///
/// `synchronized` turns true at the first delimiter. A record that outgrows the
/// buffer is dropped along with everything up to the next delimiter; that overflow
/// is only worth a warning once synchronized, because before the first delimiter
/// the bytes are curl's table header rather than a progress row.
#[derive(Debug)]
pub struct LineAccumulator {
    buffer: BoundedBuffer,
    synchronized: bool,
    discarding: bool,
    overflows: usize,
}

impl LineAccumulator {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: BoundedBuffer::with_capacity(capacity),
            synchronized: false,
            discarding: false,
            overflows: 0,
        }
    }

    /// Consume one chunk and return the records it completed, in stream order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProgressRecord> {
        let mut records = Vec::new();
        let mut rest = chunk;
        while !rest.is_empty() {
            match rest.iter().position(|&byte| byte == SYNC_BYTE) {
                Some(idx) => {
                    if let Some(record) = self.complete(&rest[..idx]) {
                        records.push(record);
                    }
                    rest = &rest[idx + 1..];
                }
                None => {
                    self.extend_partial(rest);
                    break;
                }
            }
        }
        records
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Bytes of the partial record carried over to the next `feed`.
    pub fn pending(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Overflows that were reported as warnings.
    pub fn overflow_count(&self) -> usize {
        self.overflows
    }

    fn complete(&mut self, segment: &[u8]) -> Option<ProgressRecord> {
        let record = if self.discarding {
            None
        } else {
            match self.buffer.append(segment) {
                Ok(()) if self.buffer.is_empty() => None,
                Ok(()) => Some(ProgressRecord::new(self.buffer.take())),
                Err(overflow) => {
                    self.on_overflow(overflow);
                    None
                }
            }
        };
        self.buffer.clear();
        self.discarding = false;
        self.synchronized = true;
        record
    }

    fn extend_partial(&mut self, bytes: &[u8]) {
        if self.discarding {
            return;
        }
        if let Err(overflow) = self.buffer.append(bytes) {
            self.on_overflow(overflow);
            self.buffer.clear();
        }
    }

    fn on_overflow(&mut self, overflow: Overflow) {
        if self.synchronized {
            self.overflows += 1;
            tracing::warn!(
                capacity = self.buffer.capacity(),
                dropped = overflow.dropped,
                "progress line overflow"
            );
            report_warning(&format!(
                "progress line longer than {} bytes, dropping it until the next carriage return",
                self.buffer.capacity()
            ));
        } else {
            log_debug(&format!(
                "skipping {} unsynchronized bytes before the first progress line",
                self.buffer.len() + overflow.dropped
            ));
        }
        self.synchronized = false;
        self.discarding = true;
    }
}

impl Default for LineAccumulator {
    fn default() -> Self {
        Self::new(crate::config::LINE_BUFFER_SIZE)
    }
}
