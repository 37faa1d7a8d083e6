//! Execution limits for a spawned process.

use crate::error::UsageError;
use std::time::Duration;

/// Bytes read from a ready channel per wakeup.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Limits applied while supervising a child.
///
/// When the timeout elapses, the process is killed with SIGKILL
/// and whatever output was captured so far is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnLimits {
    /// Wall-clock timeout for the process.
    ///
    /// Default: `None`, wait for the child indefinitely.
    pub timeout: Option<Duration>,

    /// Maximum bytes read from one channel per readiness event.
    ///
    /// Default: 1024.
    pub chunk_size: usize,
}

impl Default for SpawnLimits {
    fn default() -> Self {
        Self {
            timeout: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl SpawnLimits {
    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Wait for the child without a deadline.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the read chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), UsageError> {
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(UsageError::ZeroTimeout);
        }
        if self.chunk_size == 0 {
            return Err(UsageError::ZeroChunkSize);
        }
        Ok(())
    }
}
