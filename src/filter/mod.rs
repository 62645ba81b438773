//! Streaming filter: frames curl's stderr into records and turns each record into
//! zenity protocol lines.

mod accumulator;
mod buffer;
mod parser;


use std::io::{self, Write};

pub use accumulator::{LineAccumulator, ProgressRecord, SYNC_BYTE};
pub use buffer::{BoundedBuffer, Overflow};
pub use parser::{parse_bar, parse_meter, ProgressFormat, ProgressUpdate, COMPLETION_LINE};

use crate::config::LINE_BUFFER_SIZE;

/// One filtering session: a framing accumulator bound to the parser chosen at startup.
#[derive(Debug)]
pub struct ProgressFilter {
    accumulator: LineAccumulator,
    format: ProgressFormat,
}

impl ProgressFilter {
    pub fn new(format: ProgressFormat) -> Self {
        Self::with_capacity(format, LINE_BUFFER_SIZE)
    }

    pub fn with_capacity(format: ProgressFormat, capacity: usize) -> Self {
        Self {
            accumulator: LineAccumulator::new(capacity),
            format,
        }
    }

    pub fn format(&self) -> ProgressFormat {
        self.format
    }

    /// Frame `chunk`, parse every completed record and write the resulting protocol
    /// lines to `out`. Returns how many updates were written.
    pub fn process<W: Write + ?Sized>(&mut self, chunk: &[u8], out: &mut W) -> io::Result<usize> {
        let mut written = 0;
        for record in self.accumulator.feed(chunk) {
            if let Some(update) = self.format.parse(record.as_bytes()) {
                update.write_to(out)?;
                written += 1;
            }
        }
        if written > 0 {
            out.flush()?;
        }
        Ok(written)
    }

    pub fn overflow_count(&self) -> usize {
        self.accumulator.overflow_count()
    }
}
