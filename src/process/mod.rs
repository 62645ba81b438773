//! Child process plumbing: close-on-exec pipes, a fork/exec builder with explicit
//! stdio bindings, and reaping.

mod child;
mod pipe;
mod spawn;


use std::fmt;

pub use child::{ChildExit, ChildProcess};
pub use pipe::Pipe;
pub use spawn::{Binding, ChildCommand};

/// Which side of the adapter a child plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// curl, whose stderr we parse.
    Producer,
    /// zenity, which reads our protocol lines.
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}
