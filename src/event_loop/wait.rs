use std::io;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::Duration;

use super::signals::{ExitSignal, SignalGuard};

/// What woke the loop.
#[derive(Debug)]
pub enum WaitOutcome {
    /// Input has bytes (possibly alongside a hangup).
    Readable,
    /// Hangup or error on the input with nothing left to read.
    Closed,
    /// The liveness timeout expired, or an unrelated signal interrupted the wait.
    TimedOut,
    SignalReceived(ExitSignal),
    Error(io::Error),
}

/// Wait until `fd` is readable, `timeout` expires, or one of the guarded signals
/// arrives. The guarded signals are unblocked only for the duration of the call.
pub fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration, guard: &SignalGuard) -> WaitOutcome {
    let mut pollfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout = libc::timespec {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_nsec: timeout.subsec_nanos() as libc::c_long,
    };
    // SAFETY: pollfd, timespec and the mask are live for the duration of the call.
    let rc = unsafe { libc::ppoll(&mut pollfd, 1, &timeout, guard.original_mask()) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return WaitOutcome::Error(err);
        }
        return match ExitSignal::take() {
            ExitSignal::None => WaitOutcome::TimedOut,
            signal => WaitOutcome::SignalReceived(signal),
        };
    }
    if rc == 0 {
        return WaitOutcome::TimedOut;
    }
    classify_revents(pollfd.revents)
}

pub(super) fn classify_revents(revents: libc::c_short) -> WaitOutcome {
    if revents & libc::POLLIN != 0 {
        WaitOutcome::Readable
    } else if revents & (libc::POLLHUP | libc::POLLERR | libc::POLLNVAL) != 0 {
        WaitOutcome::Closed
    } else {
        WaitOutcome::TimedOut
    }
}

/// Non-blocking readiness probe used to drain what is already buffered.
pub fn ready_now(fd: BorrowedFd<'_>) -> bool {
    let mut pollfd = libc::pollfd {
        fd: fd.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: single live pollfd, zero timeout.
    let rc = unsafe { libc::poll(&mut pollfd, 1, 0) };
    rc > 0 && pollfd.revents & libc::POLLIN != 0
}
