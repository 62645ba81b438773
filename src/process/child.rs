use anyhow::{anyhow, Result};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::thread;
use std::time::{Duration, Instant};

use super::Role;
use crate::logging::log_debug;

const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// A forked child that is reaped exactly once, either by `wait` or on drop.
#[derive(Debug)]
pub struct ChildProcess {
    pid: libc::pid_t,
    role: Role,
    program: String,
    reaped: bool,
}

impl ChildProcess {
    pub(super) fn new(pid: libc::pid_t, role: Role, program: String) -> Self {
        Self {
            pid,
            role,
            program,
            reaped: false,
        }
    }

    pub fn pid(&self) -> libc::pid_t {
        self.pid
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Best-effort SIGTERM; the child is still reaped by `wait`.
    pub fn terminate(&self) {
        if self.reaped {
            return;
        }
        // SAFETY: pid refers to our unreaped child, so it cannot have been recycled.
        if unsafe { libc::kill(self.pid, libc::SIGTERM) } != 0 {
            log_debug(&format!(
                "SIGTERM to {} `{}` failed: {}",
                self.role,
                self.program,
                io::Error::last_os_error()
            ));
        }
    }

    /// Block until the child exits, retrying on EINTR.
    pub fn wait(mut self) -> Result<ChildExit> {
        let mut status = 0;
        loop {
            // SAFETY: blocking waitpid on our own child with a stack-local status.
            let ret = unsafe { libc::waitpid(self.pid, &mut status, 0) };
            if ret == self.pid {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            // The pid is no longer ours to signal.
            self.reaped = true;
            return Err(anyhow!(
                "waitpid {} `{}` (pid {}): {err}",
                self.role,
                self.program,
                self.pid
            ));
        }
        self.reaped = true;
        log_debug(&format!(
            "reaped {} `{}` (pid {}) raw status {status}",
            self.role, self.program, self.pid
        ));
        Ok(ChildExit {
            role: self.role,
            program: std::mem::take(&mut self.program),
            status: ExitStatus::from_raw(status),
        })
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        self.terminate();
        if wait_for_exit(self.pid, TERMINATE_GRACE) {
            return;
        }
        // SAFETY: still our unreaped child; SIGKILL then a blocking reap.
        unsafe {
            if libc::kill(self.pid, libc::SIGKILL) != 0 {
                log_debug(&format!(
                    "SIGKILL to {} `{}` failed: {}",
                    self.role,
                    self.program,
                    io::Error::last_os_error()
                ));
            }
            let mut status = 0;
            if libc::waitpid(self.pid, &mut status, 0) < 0 {
                log_debug(&format!(
                    "waitpid after SIGKILL failed: {}",
                    io::Error::last_os_error()
                ));
            }
        }
    }
}

/// Poll for the child to terminate, giving up after `timeout`.
fn wait_for_exit(pid: libc::pid_t, timeout: Duration) -> bool {
    let start = Instant::now();
    let mut status = 0;
    while start.elapsed() < timeout {
        // SAFETY: WNOHANG only inspects the state of our own child.
        let result = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG) };
        if result > 0 {
            return true;
        }
        if result < 0 {
            log_debug(&format!(
                "waitpid({pid}) failed: {}",
                io::Error::last_os_error()
            ));
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

/// How a reaped child ended.
#[derive(Debug, Clone)]
pub struct ChildExit {
    pub role: Role,
    pub program: String,
    pub status: ExitStatus,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// `None` for a zero exit, otherwise the line reported to the user.
    pub fn failure_message(&self) -> Option<String> {
        if self.success() {
            return None;
        }
        let how = match (self.status.code(), self.status.signal()) {
            (Some(code), _) => format!("exited with status={code}"),
            (None, Some(signal)) => format!("terminated by signal {signal}"),
            (None, None) => format!("ended abnormally ({})", self.status),
        };
        Some(format!("{} `{}` {how}", self.role, self.program))
    }
}
