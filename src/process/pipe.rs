use anyhow::Result;
use std::os::fd::{FromRawFd, OwnedFd};

use crate::event_loop::errno_error;

/// Both ends of an anonymous pipe, close-on-exec so neither leaks into a child
/// unless it is explicitly bound to one of the child's stdio slots.
#[derive(Debug)]
pub struct Pipe {
    pub reader: OwnedFd,
    pub writer: OwnedFd,
}

impl Pipe {
    pub fn new() -> Result<Self> {
        let mut fds = [-1; 2];
        // SAFETY: pipe2 writes two descriptors into the array on success.
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
            return Err(errno_error("pipe"));
        }
        // SAFETY: both descriptors are fresh and owned by nobody else.
        Ok(unsafe {
            Self {
                reader: OwnedFd::from_raw_fd(fds[0]),
                writer: OwnedFd::from_raw_fd(fds[1]),
            }
        })
    }

    pub fn into_parts(self) -> (OwnedFd, OwnedFd) {
        (self.reader, self.writer)
    }
}
