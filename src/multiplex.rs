//! Concurrent draining of the child's output channels.
//!
//! One `poll(2)` call waits on every channel that is still open, bounded by
//! the deadline budget. Each ready channel gets one bounded read per wakeup
//! into its own buffer, so byte order within a channel is preserved while
//! interleaving across channels is arbitrary.

use crate::deadline::{Budget, Clock, Deadline};
use crate::error::ExecError;
use crate::launcher::ChildStreams;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, OwnedFd};
use std::time::Duration;
use tracing::{debug, trace};

/// Output channels read from the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Stdout,
    Stderr,
    LaunchError,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Stdout => write!(f, "stdout"),
            Channel::Stderr => write!(f, "stderr"),
            Channel::LaunchError => write!(f, "launch error"),
        }
    }
}

/// How the drain loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drain {
    /// Every channel reached end-of-stream.
    Finished,
    /// The deadline budget ran out first.
    TimedOut,
}

/// Accumulated bytes, one buffer per channel.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Buffers {
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
    pub(crate) launch_error: Vec<u8>,
}

struct Stream {
    channel: Channel,
    /// `None` once the channel reached end-of-stream.
    file: Option<File>,
    buf: Vec<u8>,
}

impl Stream {
    fn new(channel: Channel, fd: OwnedFd) -> Self {
        Self {
            channel,
            file: Some(File::from(fd)),
            buf: Vec::new(),
        }
    }

    /// Read one chunk. Zero bytes or a hard error closes the channel.
    fn read_chunk(&mut self, chunk: &mut [u8]) {
        let Some(file) = self.file.as_mut() else {
            return;
        };
        match file.read(chunk) {
            Ok(0) => self.close("end of stream"),
            Ok(n) => {
                trace!(channel = %self.channel, bytes = n, "read chunk");
                self.buf.extend_from_slice(&chunk[..n]);
            }
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
            Err(e) => {
                debug!(channel = %self.channel, error = %e, "read failed");
                self.close("read error");
            }
        }
    }

    fn close(&mut self, reason: &str) {
        debug!(channel = %self.channel, reason, "channel closed");
        self.file = None;
    }
}

/// Drains stdout, stderr and the launch error channel until all of them
/// close or the deadline expires.
pub(crate) struct Multiplexer {
    streams: [Stream; 3],
    chunk: Vec<u8>,
}

impl Multiplexer {
    pub(crate) fn new(streams: ChildStreams, chunk_size: usize) -> Self {
        Self {
            streams: [
                Stream::new(Channel::Stdout, streams.stdout),
                Stream::new(Channel::Stderr, streams.stderr),
                Stream::new(Channel::LaunchError, streams.launch_error),
            ],
            chunk: vec![0; chunk_size],
        }
    }

    /// Wait for and read output until every channel closes or the deadline
    /// expires.
    ///
    /// # Errors
    ///
    /// `ExecError::Poll` if `poll(2)` fails with anything but `EINTR`.
    pub(crate) fn drain<C: Clock>(&mut self, deadline: &Deadline<C>) -> Result<Drain, ExecError> {
        loop {
            let open: Vec<usize> = (0..self.streams.len())
                .filter(|&i| self.streams[i].file.is_some())
                .collect();
            if open.is_empty() {
                return Ok(Drain::Finished);
            }

            let timeout = match deadline.remaining() {
                Budget::Expired => return Ok(Drain::TimedOut),
                Budget::Unbounded => PollTimeout::NONE,
                Budget::Remaining(left) => PollTimeout::from(poll_millis(left)),
            };

            let ready: Vec<usize> = {
                let mut fds: Vec<PollFd<'_>> = open
                    .iter()
                    .filter_map(|&i| self.streams[i].file.as_ref())
                    .map(|file| PollFd::new(file.as_fd(), PollFlags::POLLIN))
                    .collect();

                let count = match poll(&mut fds, timeout) {
                    // Budget elapsed; the next iteration decides.
                    Ok(0) => continue,
                    Ok(n) => n,
                    Err(Errno::EINTR) => continue,
                    Err(e) => return Err(ExecError::Poll(e)),
                };

                let ready: Vec<usize> = open
                    .iter()
                    .zip(&fds)
                    .filter(|(_, fd)| fd.revents().is_some_and(|r| !r.is_empty()))
                    .map(|(&i, _)| i)
                    .collect();
                // poll(2) counts exactly the entries with non-empty revents.
                if ready.is_empty() {
                    unreachable!("poll returned {count} but no descriptor has revents");
                }
                ready
            };

            for i in ready {
                self.streams[i].read_chunk(&mut self.chunk);
            }
        }
    }

    /// Give up the buffers, closing any channel that is still open.
    pub(crate) fn into_buffers(self) -> Buffers {
        let [stdout, stderr, launch_error] = self.streams;
        Buffers {
            stdout: stdout.buf,
            stderr: stderr.buf,
            launch_error: launch_error.buf,
        }
    }
}

/// Milliseconds for one poll, rounded up so a sub-millisecond budget does
/// not spin, and clamped; the budget is recomputed after every wakeup.
fn poll_millis(left: Duration) -> u16 {
    let millis = left.as_nanos().div_ceil(1_000_000);
    u16::try_from(millis).unwrap_or(u16::MAX)
}
