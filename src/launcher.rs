//! Fork the child and wire its output to pipes.
//!
//! Four pipes exist before the fork: stdout, stderr, launch error and the
//! handshake. After the fork each side closes the ends it does not use, which
//! is what makes end-of-stream observable once the child exits.
//!
//! If exec fails, the child writes `"<argv0>: <strerror>"` to the launch error
//! pipe and exits with status 127. That status means nothing; the supervisor
//! only looks at the pipe.

use crate::error::ExecError;
use crate::exec_image::ExecImage;
use crate::handshake::{self, Handshake, Release};
use crate::pipes::cloexec_pipe;
use nix::errno::Errno;
use nix::unistd::{fork, ForkResult, Pid};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use tracing::debug;

/// Exit status of a child whose exec failed. Not meaningful to callers.
const LAUNCH_FAILURE_STATUS: libc::c_int = 127;

/// Parent-side read ends of the child's output channels.
#[derive(Debug)]
pub(crate) struct ChildStreams {
    pub(crate) stdout: OwnedFd,
    pub(crate) stderr: OwnedFd,
    pub(crate) launch_error: OwnedFd,
}

/// A forked child still waiting for its release.
#[derive(Debug)]
pub(crate) struct Launched {
    pub(crate) pid: Pid,
    pub(crate) streams: ChildStreams,
    pub(crate) release: Release,
}

/// Raw descriptors as seen by the child.
struct ChildFds {
    stdout_read: RawFd,
    stdout_write: RawFd,
    stderr_read: RawFd,
    stderr_write: RawFd,
    error_read: RawFd,
    error_write: RawFd,
    release_read: RawFd,
    release_write: RawFd,
}

/// Fork a child that will exec `image` once released.
///
/// All pipe ends are `OwnedFd`s, so every descriptor is closed on every
/// error path.
pub(crate) fn launch(image: &ExecImage<'_>) -> Result<Launched, ExecError> {
    let stdout = cloexec_pipe("stdout")?;
    let stderr = cloexec_pipe("stderr")?;
    let launch_error = cloexec_pipe("launch error")?;
    let handshake = Handshake::new()?;

    let fds = ChildFds {
        stdout_read: stdout.read.as_raw_fd(),
        stdout_write: stdout.write.as_raw_fd(),
        stderr_read: stderr.read.as_raw_fd(),
        stderr_write: stderr.write.as_raw_fd(),
        error_read: launch_error.read.as_raw_fd(),
        error_write: launch_error.write.as_raw_fd(),
        release_read: handshake.read_fd().as_raw_fd(),
        release_write: handshake.write_fd().as_raw_fd(),
    };

    // SAFETY: the child only makes async-signal-safe calls (dup2, close,
    // read, write, exec, _exit) and never returns into Rust code.
    match unsafe { fork() }.map_err(ExecError::Fork)? {
        ForkResult::Child => unsafe { become_target(&fds, image) },
        ForkResult::Parent { child } => {
            debug!(
                pid = %child,
                program = %image.program().to_string_lossy(),
                replaces_env = image.replaces_env(),
                "forked child"
            );

            let (release_read, release) = handshake.split();
            drop(release_read);
            drop(stdout.write);
            drop(stderr.write);
            drop(launch_error.write);

            Ok(Launched {
                pid: child,
                streams: ChildStreams {
                    stdout: stdout.read,
                    stderr: stderr.read,
                    launch_error: launch_error.read,
                },
                release,
            })
        }
    }
}

/// Child half of the launch. Never returns.
///
/// Every pipe end sits above `STDERR_FILENO` (see [`cloexec_pipe`]), so the
/// `dup2`s below cannot land on a descriptor that is closed afterwards.
unsafe fn become_target(fds: &ChildFds, image: &ExecImage<'_>) -> ! {
    // dup2 clears FD_CLOEXEC on the new descriptor.
    if libc::dup2(fds.stdout_write, libc::STDOUT_FILENO) == -1
        || libc::dup2(fds.stderr_write, libc::STDERR_FILENO) == -1
    {
        report_and_exit(fds.error_write, image.name().to_bytes(), Errno::last());
    }

    for fd in [
        fds.stdout_read,
        fds.stdout_write,
        fds.stderr_read,
        fds.stderr_write,
        fds.error_read,
        fds.release_write,
    ] {
        libc::close(fd);
    }

    handshake::wait_for_release(fds.release_read);
    libc::close(fds.release_read);

    let errno = image.exec();
    report_and_exit(fds.error_write, image.name().to_bytes(), errno)
}

unsafe fn report_and_exit(fd: RawFd, name: &[u8], errno: Errno) -> ! {
    write_all_raw(fd, name);
    write_all_raw(fd, b": ");
    write_all_raw(fd, errno.desc().as_bytes());
    libc::close(fd);
    libc::_exit(LAUNCH_FAILURE_STATUS)
}

/// Best effort; the parent treats any bytes on the pipe as a launch failure.
unsafe fn write_all_raw(fd: RawFd, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        let n = libc::write(fd, bytes.as_ptr().cast(), bytes.len());
        if n < 0 {
            if Errno::last() == Errno::EINTR {
                continue;
            }
            return;
        }
        bytes = &bytes[n as usize..];
    }
}
