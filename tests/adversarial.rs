//! Adversarial tests for spawn_guard.
//!
//! These tests feed hostile arguments, environments and child behavior to the
//! supervisor. Every test shows that the input is passed through literally or
//! rejected, and that a misbehaving child cannot hang the caller.

use spawn_guard::{SpawnRequest, SpawnResult, UsageError};
use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn echo(args: &[&str]) -> SpawnResult {
    let mut argv = vec!["/bin/echo"];
    argv.extend_from_slice(args);
    SpawnRequest::new(argv)
        .with_timeout(Duration::from_secs(10))
        .prepare()
        .expect("valid request")
        .run()
        .expect("spawn")
}

fn bounded(argv: &[&str], timeout: Duration) -> SpawnResult {
    SpawnRequest::new(argv.iter().copied())
        .with_timeout(timeout)
        .prepare()
        .expect("valid request")
        .run()
        .expect("spawn")
}

// =============================================================================
// NULL BYTE INJECTION ATTACKS
// =============================================================================

#[test]
fn test_null_byte_in_program_path() {
    // Attack: truncate "/bin/echo\0/bin/bash" to a different program
    let request = SpawnRequest::new(["/bin/echo\0/bin/bash", "x"]);
    assert_eq!(
        request.prepare().unwrap_err(),
        UsageError::NulByte {
            what: "argv[0]".to_string()
        }
    );
}

#[test]
fn test_null_byte_in_argument() {
    let request = SpawnRequest::new(["/bin/echo", "pattern\0--file=/etc/passwd"]);
    assert!(matches!(
        request.prepare(),
        Err(UsageError::NulByte { .. })
    ));
}

#[test]
fn test_null_byte_in_env_name() {
    let request = SpawnRequest::new(["/usr/bin/env"]).with_env_var("PATH\0LD_PRELOAD", "/evil");
    assert!(matches!(
        request.prepare(),
        Err(UsageError::NulByte { .. })
    ));
}

#[test]
fn test_equals_in_env_name() {
    // Attack: smuggle a second assignment through the name
    let request = SpawnRequest::new(["/usr/bin/env"]).with_env_var("HOME=/tmp LD_PRELOAD", "x");
    assert!(matches!(
        request.prepare(),
        Err(UsageError::InvalidEnvName { .. })
    ));
}

// =============================================================================
// SHELL METACHARACTER ATTACKS
// =============================================================================

#[test]
fn test_shell_command_substitution() {
    let payloads = ["$(id)", "`id`", "${HOME}", "$HOME"];
    for payload in payloads {
        let result = echo(&[payload]);
        assert_eq!(result.stdout_string(), format!("{}\n", payload));
    }
}

#[test]
fn test_shell_pipe_and_redirect() {
    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("pwned");
    let redirect = format!("> {}", target.display());

    let result = echo(&["a", "|", "cat", ";", "true", "&&", &redirect]);
    assert_eq!(
        result.stdout_string(),
        format!("a | cat ; true && {}\n", redirect)
    );
    assert!(!target.exists(), "redirect must not be interpreted");
}

#[test]
fn test_shell_glob_patterns() {
    let result = echo(&["/*", "*.rs", "?", "[a-z]"]);
    assert_eq!(result.stdout_string(), "/* *.rs ? [a-z]\n");
}

#[test]
fn test_quotes_and_whitespace_preserved() {
    let arg = "it's \"quoted\"\twith  spaces\nand a newline";
    let result = echo(&[arg]);
    assert_eq!(result.stdout_string(), format!("{}\n", arg));
}

#[test]
fn test_program_name_with_metacharacters() {
    // A "program" that is really a shell command line.
    let result = bounded(&["echo hi; touch /tmp/x"], Duration::from_secs(5));
    assert!(result.is_spawn_failed(), "got {:?}", result);
}

// =============================================================================
// ENVIRONMENT ATTACKS
// =============================================================================

#[test]
fn test_override_drops_dangerous_parent_vars() {
    std::env::set_var("SPAWN_GUARD_SECRET", "hunter2");
    let result = SpawnRequest::new(["/usr/bin/env"])
        .with_env_override(HashMap::from([("SAFE".to_string(), "1".to_string())]))
        .prepare()
        .unwrap()
        .run()
        .unwrap();
    assert!(!result.stdout_string().contains("hunter2"));
    assert_eq!(result.stdout_string(), "SAFE=1\n");
}

#[test]
fn test_env_value_with_metacharacters() {
    let value = "$(rm -rf /); `id`";
    let result = SpawnRequest::new(["/usr/bin/env"])
        .with_env_var("VALUE", value)
        .prepare()
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(result.stdout_string(), format!("VALUE={}\n", value));
}

// =============================================================================
// MISBEHAVING CHILD ATTACKS
// =============================================================================

#[test]
fn test_child_ignoring_sigterm_still_killed() {
    let started = Instant::now();
    let result = bounded(
        &["/bin/sh", "-c", "trap '' TERM INT HUP; while :; do sleep 1; done"],
        Duration::from_millis(500),
    );
    assert!(result.is_timed_out());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_child_closing_its_output_cannot_hang() {
    let started = Instant::now();
    let result = bounded(
        &["/bin/sh", "-c", "exec >&- 2>&-; exec /bin/sleep 20"],
        Duration::from_millis(500),
    );
    assert!(result.is_timed_out(), "got {:?}", result);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_grandchild_holding_pipe_cannot_hang() {
    // The shell exits at once but leaves a background sleeper on stdout.
    let started = Instant::now();
    let result = bounded(
        &["/bin/sh", "-c", "/bin/sleep 3 & echo parent done"],
        Duration::from_millis(500),
    );
    match result {
        SpawnResult::TimedOut { stdout, .. } => assert_eq!(stdout, b"parent done\n"),
        other => panic!("expected TimedOut, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn test_output_flood_until_timeout() {
    let result = bounded(&["/bin/sh", "-c", "yes flood"], Duration::from_millis(300));
    match result {
        SpawnResult::TimedOut { stdout, .. } => {
            assert!(!stdout.is_empty());
            assert!(stdout.starts_with(b"flood\n"));
        }
        other => panic!("expected TimedOut, got {:?}", other),
    }
}

#[test]
fn test_binary_output_preserved() {
    let result = bounded(
        &["/bin/sh", "-c", "printf '\\000\\001\\377'"],
        Duration::from_secs(5),
    );
    assert_eq!(result.stdout(), &[0u8, 1, 255]);
}

// =============================================================================
// CONCURRENCY ATTACKS
// =============================================================================

#[test]
fn test_many_concurrent_calls() {
    let handles: Vec<_> = (0..16)
        .map(|i| {
            thread::spawn(move || {
                let script = format!("echo out{i}; echo err{i} >&2; exit {i}");
                let result = bounded(&["/bin/sh", "-c", &script], Duration::from_secs(20));
                (i, result)
            })
        })
        .collect();

    for handle in handles {
        let (i, result) = handle.join().unwrap();
        assert_eq!(result.exit_code(), Some(i));
        assert_eq!(result.stdout_string(), format!("out{}\n", i));
        assert_eq!(result.stderr_string(), format!("err{}\n", i));
    }
}

#[test]
fn test_concurrent_timeouts_and_completions() {
    let slow = thread::spawn(|| bounded(&["/bin/sleep", "20"], Duration::from_millis(700)));
    let fast: Vec<_> = (0..8)
        .map(|i| thread::spawn(move || echo(&[&i.to_string()])))
        .collect();

    for (i, handle) in fast.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap().stdout_string(), format!("{}\n", i));
    }
    assert!(slow.join().unwrap().is_timed_out());
}
