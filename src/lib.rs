//! # spawn_guard
//!
//! Shell-free process spawning with deadline-bounded output capture.
//!
//! `spawn_guard` launches an external program from an argv vector, drains its
//! stdout and stderr concurrently, and kills it if it outlives a wall-clock
//! timeout. Every call ends in exactly one [`SpawnResult`]: the program
//! completed, timed out, or could not be executed at all.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spawn_guard::{SpawnRequest, SpawnResult};
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let result = SpawnRequest::new(["/bin/ls", "/"])
//!     .with_timeout(Duration::from_secs(5))
//!     .prepare()?
//!     .run()?;
//!
//! match result {
//!     SpawnResult::Completed { exit_code, stdout, .. } => {
//!         println!("exit {}: {}", exit_code, String::from_utf8_lossy(&stdout));
//!     }
//!     SpawnResult::TimedOut { stdout, .. } => {
//!         println!("killed after timeout, {} bytes captured", stdout.len());
//!     }
//!     SpawnResult::SpawnFailed { message } => println!("could not run: {}", message),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Design Principles
//!
//! - **No shell interpretation**: arguments go straight to execve
//! - **Handshake before exec**: the child waits until the parent has closed
//!   its unused pipe ends and is ready to read
//! - **Bounded waits**: every `poll(2)` is bounded by the remaining budget, and
//!   a clock that runs backwards counts as an expired deadline
//! - **No zombies**: a timed-out child is killed with SIGKILL and reaped
//!   before the call returns
//!
//! ## Platform Support
//!
//! Unix only (Linux, macOS, BSDs). The launcher is built on fork, pipes and
//! poll.

#[cfg(windows)]
compile_error!(
    "spawn_guard does not support Windows. \
     The launcher relies on fork(2), pipe(2) and poll(2)."
);

mod deadline;
mod error;
mod exec_image;
mod handshake;
mod launcher;
mod limits;
mod multiplex;
mod output;
mod pipes;
mod prepared;
mod request;
mod resolve;
mod supervisor;

// Public API
pub use error::{ExecError, SpawnError, UsageError};
pub use limits::{SpawnLimits, DEFAULT_CHUNK_SIZE};
pub use output::SpawnResult;
pub use prepared::PreparedSpawn;
pub use request::SpawnRequest;

/// Validate and run `request`, blocking until it finishes.
///
/// Shorthand for `request.prepare()?.run()`.
///
/// # Errors
///
/// `SpawnError::Usage` for a malformed request (nothing was started) and
/// `SpawnError::Exec` for operating-system failures.
pub fn run(request: SpawnRequest) -> Result<SpawnResult, SpawnError> {
    Ok(request.prepare()?.run()?)
}
