use anyhow::{Context, Result};
use std::ffi::{CStr, CString};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::{io, ptr};

use super::{ChildProcess, Role};
use crate::event_loop::{errno_error, SignalGuard, EXIT_SIGNALS};
use crate::logging::log_debug;

/// What a child's stdin, stdout or stderr is connected to.
#[derive(Debug, Default)]
pub enum Binding {
    /// Keep the parent's descriptor.
    #[default]
    Inherit,
    /// Move this descriptor into the slot; the parent's copy closes after fork.
    Fd(OwnedFd),
    /// Leave the slot closed.
    Close,
}

impl Binding {
    fn raw(&self) -> RawBinding {
        match self {
            Binding::Inherit => RawBinding::Inherit,
            Binding::Fd(fd) => RawBinding::Fd(fd.as_raw_fd()),
            Binding::Close => RawBinding::Close,
        }
    }
}

#[derive(Clone, Copy)]
enum RawBinding {
    Inherit,
    Fd(RawFd),
    Close,
}

/// Builder for one producer or consumer child.
#[derive(Debug)]
pub struct ChildCommand {
    role: Role,
    program: String,
    args: Vec<String>,
    stdin: Binding,
    stdout: Binding,
    stderr: Binding,
}

impl ChildCommand {
    pub fn new(role: Role, program: impl Into<String>) -> Self {
        Self {
            role,
            program: program.into(),
            args: Vec::new(),
            stdin: Binding::Inherit,
            stdout: Binding::Inherit,
            stderr: Binding::Inherit,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stdin(mut self, binding: Binding) -> Self {
        self.stdin = binding;
        self
    }

    pub fn stdout(mut self, binding: Binding) -> Self {
        self.stdout = binding;
        self
    }

    pub fn stderr(mut self, binding: Binding) -> Self {
        self.stderr = binding;
        self
    }

    /// Fork and exec. Everything the child touches is prepared before `fork`, so the
    /// child never allocates. An exec failure is reported by the child on the original
    /// stderr and surfaces here later as exit status 1.
    pub fn spawn(self, guard: &SignalGuard) -> Result<ChildProcess> {
        let ChildCommand {
            role,
            program,
            args,
            stdin,
            stdout,
            stderr,
        } = self;

        let argv = std::iter::once(program.as_str())
            .chain(args.iter().map(String::as_str))
            .map(|arg| {
                CString::new(arg)
                    .with_context(|| format!("{role} argument contains a NUL byte: {arg:?}"))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut argv_ptrs: Vec<*const libc::c_char> = argv.iter().map(|s| s.as_ptr()).collect();
        argv_ptrs.push(ptr::null());

        let prefix = format!("error: {role} `{program}`: ");
        let slots = [
            (libc::STDIN_FILENO, stdin.raw()),
            (libc::STDOUT_FILENO, stdout.raw()),
            (libc::STDERR_FILENO, stderr.raw()),
        ];
        let mask = *guard.original_mask();

        // SAFETY: the child branch only calls async-signal-safe functions on data
        // prepared above and never returns.
        let pid = unsafe { libc::fork() };
        if pid < 0 {
            return Err(errno_error(&format!("fork {role} `{program}`")));
        }
        if pid == 0 {
            // SAFETY: we are the freshly forked child.
            unsafe { child_exec(&argv_ptrs, &slots, &mask, prefix.as_bytes()) }
        }

        // Child-side descriptors belong to the child now.
        drop((stdin, stdout, stderr));
        log_debug(&format!("spawned {role} `{program}` as pid {pid}"));
        tracing::debug!(%role, program = %program, pid, "child spawned");
        Ok(ChildProcess::new(pid, role, program))
    }
}

/// Child process setup after fork: wires stdio and execs the target binary.
///
/// # Safety
///
/// Must only be called in the child process after `fork()`. It never returns: it
/// either replaces the process image or calls `_exit(1)`.
unsafe fn child_exec(
    argv: &[*const libc::c_char],
    slots: &[(RawFd, RawBinding)],
    original_mask: &libc::sigset_t,
    prefix: &[u8],
) -> ! {
    // Keep a handle on the original stderr for failure reports, closed by a successful exec.
    let mut report_fd = libc::fcntl(libc::STDERR_FILENO, libc::F_DUPFD_CLOEXEC, 3);
    if report_fd < 0 {
        report_fd = libc::STDERR_FILENO;
    }

    let fail = |context: &[u8]| -> ! {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
        let mut buf = [0 as libc::c_char; 128];
        let reason: &[u8] = if libc::strerror_r(errno, buf.as_mut_ptr(), buf.len()) == 0 {
            CStr::from_ptr(buf.as_ptr()).to_bytes()
        } else {
            b"unknown error"
        };
        let parts: [&[u8]; 5] = [prefix, context, b" failed: ", reason, b"\n"];
        for part in parts {
            // SAFETY: write is async-signal-safe and the buffers outlive the call.
            let _ = libc::write(report_fd, part.as_ptr() as *const libc::c_void, part.len());
        }
        libc::_exit(1);
    };

    // The parent's handlers only store a flag; reset them before unmasking so a
    // signal pending since fork is delivered with its default action.
    for signo in EXIT_SIGNALS {
        if libc::signal(signo, libc::SIG_DFL) == libc::SIG_ERR {
            fail(b"signal");
        }
    }
    if libc::pthread_sigmask(libc::SIG_SETMASK, original_mask, ptr::null_mut()) != 0 {
        fail(b"sigprocmask");
    }
    if libc::signal(libc::SIGPIPE, libc::SIG_DFL) == libc::SIG_ERR {
        fail(b"signal(SIGPIPE)");
    }

    for &(target, binding) in slots {
        match binding {
            RawBinding::Inherit => {}
            RawBinding::Fd(fd) if fd == target => {
                if libc::fcntl(fd, libc::F_SETFD, 0) < 0 {
                    fail(b"fcntl(F_SETFD)");
                }
            }
            RawBinding::Fd(fd) => {
                if libc::dup2(fd, target) < 0 {
                    fail(b"dup2");
                }
            }
            RawBinding::Close => {
                let _ = libc::close(target);
            }
        }
    }

    libc::execvp(argv[0], argv.as_ptr());
    fail(b"execvp");
}
