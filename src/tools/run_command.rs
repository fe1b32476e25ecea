//! executeCommand: run a shell command in the workspace root.

use super::{ParamSpec, ParamType, ToolContext, ToolDescriptor, ToolOutcome, EXECUTE_COMMAND};
use crate::config::BashConfig;
use crate::error::CommandError;
use crate::project::ToolEffect;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor {
        name: EXECUTE_COMMAND,
        description: "Execute a terminal command and return the output",
        params: vec![ParamSpec::required(
            "command",
            ParamType::String,
            "The terminal command to execute",
        )],
    }
}

pub fn execute(ctx: &ToolContext, command: &str) -> ToolOutcome {
    match run(command, &ctx.root, &ctx.bash) {
        Ok(stdout) => ToolOutcome::success(
            format!("Success: {}", stdout),
            Some(ToolEffect::CommandSucceeded {
                command: command.to_string(),
            }),
        ),
        Err(e) => {
            tracing::warn!(command, error = %e, "command failed");
            ToolOutcome::failure(e.to_string())
        }
    }
}

fn shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}

/// How long to keep reading output after the shell exits. Background jobs
/// inherit the pipes and may hold them open indefinitely.
const OUTPUT_GRACE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Run `command` to completion, returning stdout.
///
/// Any stderr output counts as failure even with a zero exit status.
/// Output still arriving once the shell has exited is collected until the
/// remaining timeout or a short grace period runs out, whichever is first.
pub fn run(command: &str, cwd: &Path, config: &BashConfig) -> Result<String, CommandError> {
    tracing::info!(command, "executing command");

    let deadline = config
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let (sh, flag) = shell();
    let mut child = Command::new(sh)
        .arg(flag)
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(CommandError::Spawn)?;

    // Readers forward chunks as they arrive so a chatty child never blocks
    // on a full pipe and nothing here waits on a pipe without a deadline.
    let (tx, rx) = mpsc::channel();
    if let Some(out) = child.stdout.take() {
        drain(out, Stream::Stdout, tx.clone());
    }
    if let Some(err) = child.stderr.take() {
        drain(err, Stream::Stderr, tx.clone());
    }
    drop(tx);

    let status = match (deadline, config.timeout_ms) {
        (Some(deadline), Some(ms)) => match child
            .wait_timeout(deadline.saturating_duration_since(Instant::now()))
            .map_err(CommandError::Spawn)?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Timeout(ms));
            }
        },
        _ => child.wait().map_err(CommandError::Spawn)?,
    };

    let grace_end = Instant::now() + OUTPUT_GRACE;
    let collect_until = match deadline {
        Some(deadline) => deadline.min(grace_end),
        None => grace_end,
    };
    let (stdout, stderr) = collect(&rx, collect_until);
    let max = config.max_output_bytes();

    if !stderr.trim().is_empty() {
        return Err(CommandError::Stderr(truncate(&stderr, max)));
    }
    if !status.success() {
        let detail = if stdout.trim().is_empty() {
            String::new()
        } else {
            format!(": {}", truncate(stdout.trim(), max))
        };
        return Err(CommandError::ExitStatus {
            code: status.code().unwrap_or(-1),
            detail,
        });
    }

    Ok(truncate(&stdout, max))
}

fn drain<R: Read + Send + 'static>(mut pipe: R, stream: Stream, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Gather output until both pipes close or `until` passes.
fn collect(rx: &Receiver<(Stream, Vec<u8>)>, until: Instant) -> (String, String) {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    loop {
        let remaining = until.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Stream::Stdout, chunk)) => stdout.extend_from_slice(&chunk),
            Ok((Stream::Stderr, chunk)) => stderr.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("output pipes still open after the command exited");
                break;
            }
        }
    }
    (
        String::from_utf8_lossy(&stdout).into_owned(),
        String::from_utf8_lossy(&stderr).into_owned(),
    )
}

/// Cap `s` at `max` bytes on a char boundary, marking the cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... [output truncated, {} bytes total]", &s[..end], s.len())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> ToolContext {
        ToolContext::new(dir.path(), BashConfig::default())
    }

    #[test]
    fn test_success_output() {
        let dir = TempDir::new().unwrap();
        let outcome = execute(&ctx(&dir), "echo hello");
        assert!(outcome.ok);
        assert_eq!(outcome.output, "Success: hello\n");
        assert_eq!(
            outcome.effect,
            Some(ToolEffect::CommandSucceeded {
                command: "echo hello".to_string()
            })
        );
    }

    #[test]
    fn test_runs_in_workspace_root() {
        let dir = TempDir::new().unwrap();
        let outcome = execute(&ctx(&dir), "mkdir counter-app");
        assert!(outcome.ok);
        assert!(dir.path().join("counter-app").is_dir());
    }

    #[test]
    fn test_stderr_is_failure() {
        let dir = TempDir::new().unwrap();
        let outcome = execute(&ctx(&dir), "echo oops 1>&2");
        assert!(!outcome.ok);
        assert_eq!(outcome.output, "Error: oops\n");
        assert!(outcome.effect.is_none());
    }

    #[test]
    fn test_nonzero_exit_without_stderr() {
        let dir = TempDir::new().unwrap();
        let outcome = execute(&ctx(&dir), "exit 3");
        assert!(!outcome.ok);
        assert!(outcome.output.contains("status 3"));
    }

    #[test]
    fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let config = BashConfig {
            timeout_ms: Some(100),
            max_output_bytes: None,
        };
        let err = run("sleep 5", dir.path(), &config).unwrap_err();
        assert!(matches!(err, CommandError::Timeout(100)));
    }

    #[test]
    fn test_background_job_does_not_outlive_timeout() {
        let dir = TempDir::new().unwrap();
        let config = BashConfig {
            timeout_ms: Some(500),
            max_output_bytes: None,
        };
        let started = Instant::now();
        let out = run("sleep 4 & echo started", dir.path(), &config).unwrap();
        assert_eq!(out, "started\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_background_job_without_timeout() {
        let dir = TempDir::new().unwrap();
        let started = Instant::now();
        let out = run("sleep 4 & echo started", dir.path(), &BashConfig::default()).unwrap();
        assert_eq!(out, "started\n");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_stderr_is_capped() {
        let dir = TempDir::new().unwrap();
        let config = BashConfig {
            timeout_ms: None,
            max_output_bytes: Some(100),
        };
        let err = run("head -c 5000 /dev/zero | tr '\\0' x 1>&2", dir.path(), &config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("[output truncated, 5000 bytes total]"));
        assert!(msg.len() < 200, "{} bytes", msg.len());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        let out = truncate("abcdef", 3);
        assert!(out.starts_with("abc\n... [output truncated"));
        // Multi-byte char straddling the limit
        let out = truncate("aé", 2);
        assert!(out.starts_with("a\n"));
    }
}
