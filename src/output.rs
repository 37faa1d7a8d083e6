//! Outcome of a supervised run.

/// What happened to the child.
///
/// Exactly one variant is produced per call. Only malformed requests and
/// operating-system failures are reported as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnResult {
    /// The program ran to completion.
    Completed {
        /// Exit code, passed through uninterpreted. A child terminated by a
        /// signal reports the negated signal number (e.g. `-9`).
        exit_code: i32,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },

    /// The deadline elapsed and the child was killed with SIGKILL.
    ///
    /// Output may be truncated mid-write.
    TimedOut { stdout: Vec<u8>, stderr: Vec<u8> },

    /// The target program could not be executed at all.
    SpawnFailed {
        /// Description of the exec failure, e.g. `"/no/such: No such file or directory"`.
        message: String,
    },
}

impl SpawnResult {
    /// Captured stdout. Empty for `SpawnFailed`.
    pub fn stdout(&self) -> &[u8] {
        match self {
            SpawnResult::Completed { stdout, .. } | SpawnResult::TimedOut { stdout, .. } => stdout,
            SpawnResult::SpawnFailed { .. } => &[],
        }
    }

    /// Captured stderr. Empty for `SpawnFailed`.
    pub fn stderr(&self) -> &[u8] {
        match self {
            SpawnResult::Completed { stderr, .. } | SpawnResult::TimedOut { stderr, .. } => stderr,
            SpawnResult::SpawnFailed { .. } => &[],
        }
    }

    /// Get stdout as a string (lossy UTF-8 conversion).
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(self.stdout()).into_owned()
    }

    /// Get stderr as a string (lossy UTF-8 conversion).
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(self.stderr()).into_owned()
    }

    /// Exit code, present only when the program ran to completion.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            SpawnResult::Completed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// True if the program completed with exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SpawnResult::Completed { .. })
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, SpawnResult::TimedOut { .. })
    }

    pub fn is_spawn_failed(&self) -> bool {
        matches!(self, SpawnResult::SpawnFailed { .. })
    }
}
