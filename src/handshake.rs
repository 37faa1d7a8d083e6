//! One-shot release signal from parent to child.
//!
//! The child blocks on the read end right after its standard streams are
//! redirected. The parent writes a single byte once its own bookkeeping is
//! done, so the target program never starts before the parent is ready to
//! observe it.
//!
//! A byte is written rather than relying on the write end being closed: a
//! child forked concurrently by another thread may briefly hold a copy of
//! the write end, and end-of-stream would not be seen until it execs.

use crate::error::ExecError;
use crate::pipes::{cloexec_pipe, Pipe};
use std::fs::File;
use std::io::Write;
use std::os::fd::{OwnedFd, RawFd};

const RELEASE_BYTE: u8 = 1;

/// The handshake pipe before the fork.
#[derive(Debug)]
pub(crate) struct Handshake {
    pipe: Pipe,
}

impl Handshake {
    pub(crate) fn new() -> Result<Self, ExecError> {
        Ok(Self {
            pipe: cloexec_pipe("handshake")?,
        })
    }

    pub(crate) fn read_fd(&self) -> &OwnedFd {
        &self.pipe.read
    }

    pub(crate) fn write_fd(&self) -> &OwnedFd {
        &self.pipe.write
    }

    /// Parent side after fork. Returns the child's read end, which the
    /// parent must drop, and the release handle.
    pub(crate) fn split(self) -> (OwnedFd, Release) {
        (
            self.pipe.read,
            Release {
                write: self.pipe.write,
            },
        )
    }
}

/// Parent-held handle that lets the child proceed to exec.
#[derive(Debug)]
pub(crate) struct Release {
    write: OwnedFd,
}

impl Release {
    /// Write the release byte and close the write end.
    pub(crate) fn release(self) -> std::io::Result<()> {
        let mut file = File::from(self.write);
        file.write_all(&[RELEASE_BYTE])
    }
}

/// Child side: block until the parent writes the release byte or goes away.
///
/// # Safety
///
/// Must only be called in the forked child before exec. Uses nothing but
/// `read(2)` on a raw descriptor.
pub(crate) unsafe fn wait_for_release(fd: RawFd) {
    let mut byte = 0u8;
    loop {
        let n = libc::read(fd, (&mut byte as *mut u8).cast(), 1);
        if n >= 0 || nix::errno::Errno::last() != nix::errno::Errno::EINTR {
            return;
        }
    }
}
