//! Prepared request ready for execution.
//!
//! This module contains `PreparedSpawn`, which can only be created by
//! `SpawnRequest::prepare()`. Every string has already been checked for
//! NUL bytes, so nothing can fail between the fork and the exec except the
//! exec itself.

use crate::error::ExecError;
use crate::limits::SpawnLimits;
use crate::output::SpawnResult;
use crate::supervisor::supervise;
use std::ffi::{CStr, CString};

/// A validated request ready for execution.
///
/// This type cannot be constructed outside of `spawn_guard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedSpawn {
    pub(crate) argv: Vec<CString>,
    pub(crate) env: Option<Vec<CString>>,
    pub(crate) limits: SpawnLimits,
}

impl PreparedSpawn {
    /// Run the program and block until it completes, times out, or fails
    /// to launch.
    ///
    /// # Errors
    ///
    /// `ExecError` only when the operating system refuses a pipe, fork,
    /// poll, wait or kill. A program that cannot be executed is reported as
    /// `SpawnResult::SpawnFailed`.
    pub fn run(&self) -> Result<SpawnResult, ExecError> {
        supervise(self)
    }

    /// Run the program on tokio's blocking pool.
    ///
    /// Requires a tokio runtime. The supervisor itself blocks in `poll(2)`,
    /// so it never runs on an async worker thread.
    pub async fn spawn(self) -> Result<SpawnResult, ExecError> {
        tokio::task::spawn_blocking(move || self.run())
            .await
            .map_err(|e| ExecError::Runtime {
                reason: e.to_string(),
            })?
    }

    /// The program as given in `argv[0]`.
    pub fn program(&self) -> &CStr {
        &self.argv[0]
    }

    /// Get the arguments, including `argv[0]`.
    pub fn argv(&self) -> &[CString] {
        &self.argv
    }

    /// Get the override environment as `KEY=VALUE` entries, if any.
    pub fn env(&self) -> Option<&[CString]> {
        self.env.as_deref()
    }

    /// Get the limits.
    pub fn limits(&self) -> &SpawnLimits {
        &self.limits
    }
}
