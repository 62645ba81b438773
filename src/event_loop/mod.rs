//! Single-threaded, signal-aware loop that pumps the producer's stderr through the
//! progress filter.

mod counters;
mod signals;
mod wait;

#[cfg(test)]
mod tests;

use std::io::{self, Write};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use crate::config::READ_CHUNK_SIZE;
use crate::filter::{ProgressFilter, ProgressFormat};
use crate::logging::{log_debug, report_os_error};

#[cfg(any(test, feature = "mutants"))]
#[allow(unused_imports)]
pub(crate) use counters::{reset_wait_count, set_read_limit, wait_count};
pub(crate) use signals::{errno_error, EXIT_SIGNALS};
#[cfg(test)]
pub(crate) use signals::signal_test_lock;
pub use signals::{ExitSignal, SignalGuard};
pub use wait::{ready_now, wait_readable, WaitOutcome};

/// Why the loop stopped.
#[derive(Debug)]
pub enum LoopExit {
    /// A read returned zero bytes.
    EndOfStream,
    /// The input hung up with nothing left to read.
    HangUp,
    /// SIGCHLD: a child ended while we were filtering.
    ChildExited,
    /// SIGINT or SIGTERM.
    Interrupted,
    /// Waiting, reading or writing failed.
    StreamError(io::Error),
}

impl LoopExit {
    /// `0` for a normal end, positive for a child exit, negative for interruption
    /// and failures.
    pub fn code(&self) -> i32 {
        match self {
            LoopExit::EndOfStream | LoopExit::HangUp => 0,
            LoopExit::ChildExited => 1,
            LoopExit::Interrupted => -1,
            LoopExit::StreamError(_) => -2,
        }
    }

    pub fn is_clean_end(&self) -> bool {
        matches!(self, LoopExit::EndOfStream | LoopExit::HangUp)
    }

    /// The producer side is done: its stream closed or a child exit was signalled.
    pub fn producer_finished(&self) -> bool {
        self.is_clean_end() || matches!(self, LoopExit::ChildExited)
    }
}

enum Pump {
    Data,
    Eof,
}

/// Run the filter over `input` until end of stream, a signal, or an I/O failure.
/// The parser is fixed by `format` for the whole run.
pub fn run_filter<W: Write + ?Sized>(
    input: BorrowedFd<'_>,
    output: &mut W,
    format: ProgressFormat,
    timeout: Duration,
    guard: &SignalGuard,
) -> LoopExit {
    let mut filter = ProgressFilter::new(format);
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    tracing::debug!(format = format.label(), fd = input.as_raw_fd(), "filter loop started");

    let exit = loop {
        #[cfg(any(test, feature = "mutants"))]
        counters::record_wait();
        match wait_readable(input, timeout, guard) {
            WaitOutcome::Readable => match pump(input, &mut chunk, &mut filter, output) {
                Ok(Pump::Data) => continue,
                Ok(Pump::Eof) => break LoopExit::EndOfStream,
                Err(err) => break LoopExit::StreamError(err),
            },
            WaitOutcome::Closed => break LoopExit::HangUp,
            WaitOutcome::TimedOut => {
                log_debug("filter loop: wait timed out, still waiting for the producer");
                continue;
            }
            WaitOutcome::SignalReceived(ExitSignal::ChildExited) => {
                drain_ready(input, &mut chunk, &mut filter, output);
                break LoopExit::ChildExited;
            }
            WaitOutcome::SignalReceived(_) => break LoopExit::Interrupted,
            WaitOutcome::Error(err) => {
                report_os_error("waiting for producer output failed", &err);
                break LoopExit::StreamError(err);
            }
        }
    };

    tracing::debug!(code = exit.code(), overflows = filter.overflow_count(), "filter loop finished");
    log_debug(&format!("filter loop finished: {exit:?}"));
    exit
}

/// Read one chunk and push it through the filter.
fn pump<W: Write + ?Sized>(
    input: BorrowedFd<'_>,
    chunk: &mut [u8],
    filter: &mut ProgressFilter,
    output: &mut W,
) -> io::Result<Pump> {
    let n = match read_chunk(input, chunk) {
        Ok(0) => return Ok(Pump::Eof),
        Ok(n) => n,
        Err(err) => {
            report_os_error("reading producer output failed", &err);
            return Err(err);
        }
    };
    if let Err(err) = filter.process(&chunk[..n], output) {
        report_os_error("writing progress updates failed", &err);
        return Err(err);
    }
    Ok(Pump::Data)
}

/// After a child exit, forward whatever the producer already wrote, without blocking.
fn drain_ready<W: Write + ?Sized>(
    input: BorrowedFd<'_>,
    chunk: &mut [u8],
    filter: &mut ProgressFilter,
    output: &mut W,
) {
    while ready_now(input) {
        match pump(input, chunk, filter, output) {
            Ok(Pump::Data) => continue,
            Ok(Pump::Eof) | Err(_) => break,
        }
    }
}

fn read_chunk(input: BorrowedFd<'_>, chunk: &mut [u8]) -> io::Result<usize> {
    let len = counters::read_limit(chunk.len());
    loop {
        // SAFETY: `chunk` is valid for `len` bytes and `input` is a live descriptor.
        let n = unsafe {
            libc::read(
                input.as_raw_fd(),
                chunk.as_mut_ptr() as *mut libc::c_void,
                len,
            )
        };
        if n >= 0 {
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
