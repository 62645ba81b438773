//! Signal plumbing shared between the async handler and the wait loop.

use anyhow::{bail, Result};
use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Signals that end the wait loop; they stay blocked except inside the wait primitive.
pub(crate) const EXIT_SIGNALS: [libc::c_int; 3] = [libc::SIGINT, libc::SIGTERM, libc::SIGCHLD];

/// Written only by `handle_exit_signal`, read and cleared only by the loop.
static EXIT_SIGNAL: AtomicU8 = AtomicU8::new(ExitSignal::None as u8);
static GUARD_ACTIVE: AtomicBool = AtomicBool::new(false);

/// What the signal handler last recorded.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSignal {
    None = 0,
    ChildExited = 1,
    TerminateRequested = 2,
}

impl ExitSignal {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ExitSignal::ChildExited,
            2 => ExitSignal::TerminateRequested,
            _ => ExitSignal::None,
        }
    }

    /// Read and clear the pending notification.
    pub fn take() -> Self {
        Self::from_raw(EXIT_SIGNAL.swap(ExitSignal::None as u8, Ordering::AcqRel))
    }

    pub fn peek() -> Self {
        Self::from_raw(EXIT_SIGNAL.load(Ordering::Acquire))
    }
}

/// Only a single atomic store: no allocation, no syscalls.
extern "C" fn handle_exit_signal(signo: libc::c_int) {
    let value = if signo == libc::SIGCHLD {
        ExitSignal::ChildExited
    } else {
        ExitSignal::TerminateRequested
    };
    EXIT_SIGNAL.store(value as u8, Ordering::Release);
}

/// Blocks INT/TERM/CHLD on the calling thread and routes them to the exit flag.
/// Dropping the guard restores the previous handlers and mask.
pub struct SignalGuard {
    original_mask: libc::sigset_t,
    previous: Vec<(libc::c_int, libc::sigaction)>,
}

impl SignalGuard {
    pub fn install() -> Result<Self> {
        if GUARD_ACTIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            bail!("signal handling is already installed");
        }
        EXIT_SIGNAL.store(ExitSignal::None as u8, Ordering::Release);

        // SAFETY: sigset_t/sigaction are plain C structs; zeroed is a valid baseline and
        // every pointer handed to libc refers to a live stack local.
        unsafe {
            let mut block: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut block);
            for signo in EXIT_SIGNALS {
                libc::sigaddset(&mut block, signo);
            }
            let mut original_mask: libc::sigset_t = mem::zeroed();
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &block, &mut original_mask);
            if rc != 0 {
                GUARD_ACTIVE.store(false, Ordering::Release);
                bail!("sigprocmask: {}", io::Error::from_raw_os_error(rc));
            }

            let mut guard = Self {
                original_mask,
                previous: Vec::with_capacity(EXIT_SIGNALS.len()),
            };
            for signo in EXIT_SIGNALS {
                let mut action: libc::sigaction = mem::zeroed();
                action.sa_sigaction = handle_exit_signal as *const () as libc::sighandler_t;
                libc::sigemptyset(&mut action.sa_mask);
                action.sa_flags = if signo == libc::SIGCHLD {
                    libc::SA_NOCLDSTOP
                } else {
                    0
                };
                let mut previous: libc::sigaction = mem::zeroed();
                if libc::sigaction(signo, &action, &mut previous) != 0 {
                    // Drop restores what was already replaced.
                    return Err(errno_error("sigaction"));
                }
                guard.previous.push((signo, previous));
            }
            Ok(guard)
        }
    }

    /// Mask in effect before the guard; the wait primitive installs it atomically.
    pub fn original_mask(&self) -> &libc::sigset_t {
        &self.original_mask
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        // SAFETY: restores actions and mask captured in `install`.
        unsafe {
            for (signo, previous) in self.previous.drain(..).rev() {
                let _ = libc::sigaction(signo, &previous, ptr::null_mut());
            }
            let _ = libc::pthread_sigmask(libc::SIG_SETMASK, &self.original_mask, ptr::null_mut());
        }
        GUARD_ACTIVE.store(false, Ordering::Release);
    }
}

/// Helper that formats OS errors with additional context.
pub(crate) fn errno_error(context: &str) -> anyhow::Error {
    anyhow::anyhow!("{context}: {}", io::Error::last_os_error())
}

#[cfg(test)]
pub(crate) fn signal_test_lock() -> &'static std::sync::Mutex<()> {
    use std::sync::{Mutex, OnceLock};
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}
