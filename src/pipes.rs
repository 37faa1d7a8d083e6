//! Close-on-exec pipe creation.
//!
//! Every end is kept above `STDERR_FILENO`. A caller running with stdin,
//! stdout or stderr closed would otherwise get pipe ends at 0..=2, and the
//! child's `dup2` onto 1 and 2 would clobber them.

use crate::error::ExecError;
use nix::fcntl::{fcntl, FcntlArg};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

/// Both ends of a pipe. Dropping either end closes it.
#[derive(Debug)]
pub(crate) struct Pipe {
    pub(crate) read: OwnedFd,
    pub(crate) write: OwnedFd,
}

/// Create a pipe whose ends are both marked close-on-exec.
///
/// Where the platform has `pipe2`, the flag is set atomically so a fork on
/// another thread never sees the descriptors without it.
#[cfg(any(
    target_os = "android",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "illumos",
    target_os = "linux",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "solaris"
))]
pub(crate) fn cloexec_pipe(channel: &'static str) -> Result<Pipe, ExecError> {
    use nix::fcntl::OFlag;

    let (read, write) = nix::unistd::pipe2(OFlag::O_CLOEXEC)
        .map_err(|source| ExecError::Pipe { channel, source })?;
    Ok(Pipe {
        read: above_stdio(read, channel)?,
        write: above_stdio(write, channel)?,
    })
}

#[cfg(not(any(
    target_os = "android",
    target_os = "dragonfly",
    target_os = "freebsd",
    target_os = "illumos",
    target_os = "linux",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "solaris"
)))]
pub(crate) fn cloexec_pipe(channel: &'static str) -> Result<Pipe, ExecError> {
    use nix::fcntl::FdFlag;

    let (read, write) =
        nix::unistd::pipe().map_err(|source| ExecError::Pipe { channel, source })?;
    for fd in [&read, &write] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(|source| ExecError::CloseOnExec { channel, source })?;
    }
    Ok(Pipe {
        read: above_stdio(read, channel)?,
        write: above_stdio(write, channel)?,
    })
}

/// Return `fd` unchanged if it is above the standard streams, otherwise a
/// close-on-exec duplicate that is. The original is closed either way.
fn above_stdio(fd: OwnedFd, channel: &'static str) -> Result<OwnedFd, ExecError> {
    if fd.as_raw_fd() > libc::STDERR_FILENO {
        return Ok(fd);
    }

    let raw = fcntl(
        fd.as_raw_fd(),
        FcntlArg::F_DUPFD_CLOEXEC(libc::STDERR_FILENO + 1),
    )
    .map_err(|source| ExecError::Relocate { channel, source })?;
    // SAFETY: F_DUPFD_CLOEXEC returned a fresh descriptor nobody else owns.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}
