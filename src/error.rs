//! Error types for spawn_guard.
//!
//! This module defines two main error categories:
//! - [`UsageError`]: Malformed requests detected during `prepare()` - no process is created
//! - [`ExecError`]: Operating-system failures while launching or supervising the child
//!
//! Neither covers a program that could not be executed, timed out, or exited
//! non-zero. Those are ordinary [`SpawnResult`](crate::SpawnResult) variants.

use nix::unistd::Pid;
use thiserror::Error;

/// Malformed request detected during `prepare()`.
///
/// These errors are caller bugs. They are reported before any pipe or
/// process exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// No program was given
    #[error("argv must contain at least the program to run")]
    EmptyArgv,

    /// An argument or environment entry cannot be passed to execve
    #[error("{what} contains an interior NUL byte")]
    NulByte { what: String },

    /// Environment variable name is empty or contains `=`
    #[error("invalid environment variable name: {name:?}")]
    InvalidEnvName { name: String },

    /// A timeout of zero can never be met
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// Reads of zero bytes would never make progress
    #[error("read chunk size must be greater than zero")]
    ZeroChunkSize,
}

/// Execution error during `run()` or `spawn()`.
///
/// These indicate the operating system refused a resource the supervisor
/// needs. There is no meaningful partial result to return, so the whole
/// call fails. Any child that was already forked has been killed and reaped.
#[derive(Debug, Error)]
pub enum ExecError {
    /// pipe(2) failed
    #[error("failed to create {channel} pipe: {source}")]
    Pipe {
        channel: &'static str,
        #[source]
        source: nix::Error,
    },

    /// Setting FD_CLOEXEC failed
    #[error("failed to mark {channel} pipe close-on-exec: {source}")]
    CloseOnExec {
        channel: &'static str,
        #[source]
        source: nix::Error,
    },

    /// Moving a pipe end off the standard descriptors failed
    #[error("failed to move {channel} pipe above the standard streams: {source}")]
    Relocate {
        channel: &'static str,
        #[source]
        source: nix::Error,
    },

    /// fork(2) failed
    #[error("failed to fork: {0}")]
    Fork(#[source] nix::Error),

    /// The release byte could not be delivered to the child
    #[error("failed to release child {pid}: {source}")]
    Handshake {
        pid: Pid,
        #[source]
        source: std::io::Error,
    },

    /// poll(2) failed for a reason other than EINTR
    #[error("failed to poll child output: {0}")]
    Poll(#[source] nix::Error),

    /// waitpid(2) failed
    #[error("failed to wait for child {pid}: {source}")]
    Wait {
        pid: Pid,
        #[source]
        source: nix::Error,
    },

    /// kill(2) failed for a reason other than ESRCH
    #[error("failed to kill child {pid}: {source}")]
    Kill {
        pid: Pid,
        #[source]
        source: nix::Error,
    },

    /// The blocking task running the supervisor did not complete
    #[error("supervisor task failed: {reason}")]
    Runtime { reason: String },
}

/// Combined error type for the prepare-and-run flow.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}
