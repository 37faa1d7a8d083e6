//! Launch, drain and reap: produces exactly one [`SpawnResult`] per call.

use crate::deadline::{Budget, Clock, Deadline, MonotonicClock};
use crate::error::ExecError;
use crate::exec_image::ExecImage;
use crate::launcher::{launch, Launched};
use crate::multiplex::{Drain, Multiplexer};
use crate::output::SpawnResult;
use crate::prepared::PreparedSpawn;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::thread;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// How often a child that closed its output is checked for exit.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run `prepared` to completion, timeout, or launch failure.
#[instrument(level = "debug", skip_all, fields(program = %prepared.program().to_string_lossy()))]
pub(crate) fn supervise(prepared: &PreparedSpawn) -> Result<SpawnResult, ExecError> {
    supervise_with_clock(prepared, MonotonicClock::new())
}

pub(crate) fn supervise_with_clock<C: Clock>(
    prepared: &PreparedSpawn,
    clock: C,
) -> Result<SpawnResult, ExecError> {
    let image = ExecImage::new(prepared.argv(), prepared.env());
    let Launched {
        pid,
        streams,
        release,
    } = launch(&image)?;

    let mut mux = Multiplexer::new(streams, prepared.limits().chunk_size);
    let deadline = Deadline::start_with_clock(prepared.limits().timeout, clock);

    if let Err(source) = release.release() {
        kill_and_reap(pid)?;
        return Err(ExecError::Handshake { pid, source });
    }
    debug!(%pid, "child released");

    let outcome = match mux.drain(&deadline) {
        Ok(outcome) => outcome,
        Err(e) => {
            kill_and_reap(pid)?;
            return Err(e);
        }
    };
    // Closes the read ends.
    let buffers = mux.into_buffers();

    let exit_code = match outcome {
        Drain::Finished => wait_within(pid, &deadline)?,
        Drain::TimedOut => None,
    };

    let Some(exit_code) = exit_code else {
        warn!(%pid, timeout = ?prepared.limits().timeout, "deadline expired, killing child");
        kill_and_reap(pid)?;
        return Ok(SpawnResult::TimedOut {
            stdout: buffers.stdout,
            stderr: buffers.stderr,
        });
    };

    if !buffers.launch_error.is_empty() {
        let message = String::from_utf8_lossy(&buffers.launch_error)
            .trim_end()
            .to_string();
        debug!(%pid, %message, "launch failed");
        return Ok(SpawnResult::SpawnFailed { message });
    }

    debug!(%pid, exit_code, "child completed");
    Ok(SpawnResult::Completed {
        exit_code,
        stdout: buffers.stdout,
        stderr: buffers.stderr,
    })
}

/// Wait for `pid` to exit without outliving the deadline. `None` means the
/// deadline expired first.
///
/// End-of-stream on every channel usually means the child exited, but a
/// child may close its output and keep running.
fn wait_within<C: Clock>(pid: Pid, deadline: &Deadline<C>) -> Result<Option<i32>, ExecError> {
    loop {
        match deadline.remaining() {
            Budget::Unbounded => return wait_for_exit(pid).map(Some),
            Budget::Expired => return Ok(None),
            Budget::Remaining(left) => {
                if let Some(code) = try_wait(pid)? {
                    return Ok(Some(code));
                }
                thread::sleep(left.min(REAP_POLL_INTERVAL));
            }
        }
    }
}

/// Exit code for a terminal wait status. A child terminated by a signal
/// yields the negated signal number.
fn status_code(status: WaitStatus) -> Option<i32> {
    match status {
        WaitStatus::Exited(_, code) => Some(code),
        WaitStatus::Signaled(_, signal, _) => Some(-(signal as i32)),
        _ => None,
    }
}

/// Block until `pid` terminates and return its exit code.
fn wait_for_exit(pid: Pid) -> Result<i32, ExecError> {
    loop {
        match waitpid(pid, None) {
            Ok(status) => {
                // Stop/continue notifications are not requested; keep waiting.
                if let Some(code) = status_code(status) {
                    debug!(%pid, code, "reaped child");
                    return Ok(code);
                }
            }
            Err(Errno::EINTR) => {}
            Err(source) => return Err(ExecError::Wait { pid, source }),
        }
    }
}

/// Reap `pid` if it has terminated, without blocking.
fn try_wait(pid: Pid) -> Result<Option<i32>, ExecError> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => {
                let code = status_code(status);
                if let Some(code) = code {
                    debug!(%pid, code, "reaped child");
                }
                return Ok(code);
            }
            Err(Errno::EINTR) => {}
            Err(source) => return Err(ExecError::Wait { pid, source }),
        }
    }
}

/// Make sure `pid` is gone: SIGKILL it unless it already exited, then reap.
fn kill_and_reap(pid: Pid) -> Result<(), ExecError> {
    if try_wait(pid)?.is_some() {
        return Ok(());
    }

    match kill(pid, Signal::SIGKILL) {
        // ESRCH: exited between the check and the kill; still needs reaping.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(source) => return Err(ExecError::Kill { pid, source }),
    }
    wait_for_exit(pid).map(|_| ())
}
