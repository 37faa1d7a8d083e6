//! Process spawn request.

use crate::error::UsageError;
use crate::limits::SpawnLimits;
use crate::prepared::PreparedSpawn;
use std::collections::HashMap;
use std::ffi::CString;
use std::time::Duration;

/// What the caller wants to run.
///
/// Must be validated by [`SpawnRequest::prepare`] before execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Program and arguments. `argv[0]` is the program: a path if it contains
    /// `/`, otherwise a name looked up in `PATH`.
    ///
    /// Passed directly to execve; no shell ever sees them.
    pub argv: Vec<String>,

    /// Complete replacement environment for the child.
    ///
    /// `None` means the child inherits the caller's environment. `Some` of an
    /// empty map runs the child with no environment at all.
    pub env_override: Option<HashMap<String, String>>,

    /// Timeout and read sizing.
    pub limits: SpawnLimits,
}

impl SpawnRequest {
    /// Create a request from an argv-style sequence.
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            env_override: None,
            limits: SpawnLimits::default(),
        }
    }

    /// Kill the child if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits = self.limits.with_timeout(timeout);
        self
    }

    /// Replace all limits at once.
    pub fn with_limits(mut self, limits: SpawnLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the read chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.limits = self.limits.with_chunk_size(chunk_size);
        self
    }

    /// Replace the child's environment with exactly `env`.
    pub fn with_env_override(mut self, env: HashMap<String, String>) -> Self {
        self.env_override = Some(env);
        self
    }

    /// Add one variable to the override environment, starting an empty
    /// override if none was set.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_override
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Validate the request and convert it into exec-ready form.
    ///
    /// # Errors
    ///
    /// Returns a `UsageError` if argv is empty, any string contains a NUL
    /// byte, an environment name is empty or contains `=`, or a limit is zero.
    pub fn prepare(self) -> Result<PreparedSpawn, UsageError> {
        if self.argv.is_empty() {
            return Err(UsageError::EmptyArgv);
        }
        self.limits.validate()?;

        let argv = self
            .argv
            .into_iter()
            .enumerate()
            .map(|(i, arg)| {
                CString::new(arg).map_err(|_| UsageError::NulByte {
                    what: format!("argv[{}]", i),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let env = self.env_override.map(env_entries).transpose()?;

        Ok(PreparedSpawn {
            argv,
            env,
            limits: self.limits,
        })
    }
}

/// Turn the override map into sorted `KEY=VALUE` entries.
fn env_entries(env: HashMap<String, String>) -> Result<Vec<CString>, UsageError> {
    let mut pairs: Vec<(String, String)> = env.into_iter().collect();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(key, value)| {
            if key.is_empty() || key.contains('=') {
                return Err(UsageError::InvalidEnvName { name: key });
            }
            let what = format!("environment variable {}", key);
            CString::new(format!("{}={}", key, value)).map_err(|_| UsageError::NulByte { what })
        })
        .collect()
}
