//! # Tools Module
//!
//! Adapters around the external programs the pipeline delegates its actual
//! work to. Every adapter satisfies the uniform [`StageExecutor`] contract:
//! given a fully wired [`Stage`] (named input paths, named output paths, and
//! an opaque property table), it performs the stage's work synchronously and
//! either produces all declared outputs or fails.
//!
//! The adapters here are deliberately thin. They translate ports and
//! properties into command lines, feed interactive group selections on
//! stdin where a tool requires them, and surface failures with the program
//! name and captured stderr attached. They implement no science of their
//! own; the single exception is the [`convert`] module, which performs the
//! final text-format structure conversion natively.

pub mod convert;
pub mod gromacs;
pub mod mutate;

use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::core::stage::{Stage, StageId};

/// Polling interval while waiting on a child process with a deadline.
const WAIT_POLL: Duration = Duration::from_millis(150);

/// How much captured stderr to keep on a tool failure.
const STDERR_TAIL_BYTES: usize = 4096;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("'{program}' exceeded its {seconds}s time limit and was killed")]
    Timeout { program: String, seconds: u64 },

    #[error("stage '{stage}' has no binding for port '{port}'")]
    MissingPort { stage: StageId, port: &'static str },

    #[error("declared output was not produced: {path}")]
    MissingOutput { path: PathBuf },

    #[error("invalid property '{key}': {reason}")]
    InvalidProperty { key: String, reason: String },

    #[error("stage '{stage}' is not handled by this executor")]
    UnsupportedStage { stage: StageId },

    #[error("unsupported structure format: {path}")]
    UnsupportedFormat { path: PathBuf },

    #[error("malformed structure record at {path}:{line}")]
    MalformedStructure { path: PathBuf, line: usize },

    #[error("selection matched no atoms in {path}")]
    EmptySelection { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The uniform contract every external tool wrapper satisfies. Execution is
/// synchronous: the call blocks until the underlying tool has finished, and
/// on success every output declared by the stage exists on disk.
pub trait StageExecutor {
    fn execute(&self, stage: &Stage) -> Result<(), ToolError>;
}

/// Read a string property, falling back to a default.
pub(crate) fn prop_str<'a>(props: &'a toml::Table, key: &str, default: &'a str) -> &'a str {
    props.get(key).and_then(|v| v.as_str()).unwrap_or(default)
}

/// Read an optional boolean property, defaulting when absent.
pub(crate) fn prop_bool(props: &toml::Table, key: &str, default: bool) -> bool {
    props.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Read an optional positive integer property.
pub(crate) fn prop_u64(props: &toml::Table, key: &str) -> Result<Option<u64>, ToolError> {
    match props.get(key) {
        None => Ok(None),
        Some(value) => match value.as_integer() {
            Some(n) if n > 0 => Ok(Some(n as u64)),
            _ => Err(ToolError::InvalidProperty {
                key: key.to_string(),
                reason: format!("expected a positive integer, got {}", value),
            }),
        },
    }
}

/// The per-stage time limit, from the `timeout-sec` property.
pub(crate) fn stage_timeout(props: &toml::Table) -> Result<Option<Duration>, ToolError> {
    Ok(prop_u64(props, "timeout-sec")?.map(Duration::from_secs))
}

/// Run an external command to completion, optionally feeding `stdin_data`
/// and enforcing a deadline. Captured stderr is attached to failures.
pub(crate) fn run_command(
    mut command: Command,
    stdin_data: Option<&str>,
    timeout: Option<Duration>,
) -> Result<(), ToolError> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(program = %program, args = ?command.get_args(), "Launching external tool.");

    command
        .stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| ToolError::Launch {
        program: program.clone(),
        source,
    })?;

    if let Some(data) = stdin_data {
        if let Some(mut stdin) = child.stdin.take() {
            // The tool may exit before consuming its stdin; a broken pipe
            // here is not the interesting failure.
            let _ = stdin.write_all(data.as_bytes());
        }
    }

    // Drain stderr on a separate thread so a chatty tool cannot fill the
    // pipe and stall while we poll for exit.
    let stderr_pipe = child.stderr.take();
    let stderr_reader = std::thread::spawn(move || {
        let mut buffer = String::new();
        if let Some(mut pipe) = stderr_pipe {
            let _ = pipe.read_to_string(&mut buffer);
        }
        buffer
    });

    let status = wait_with_deadline(&mut child, &program, timeout)?;
    let stderr = stderr_reader.join().unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(ToolError::Exit {
            program,
            status,
            stderr: stderr_tail(&stderr),
        })
    }
}

fn wait_with_deadline(
    child: &mut Child,
    program: &str,
    timeout: Option<Duration>,
) -> Result<ExitStatus, ToolError> {
    let Some(limit) = timeout else {
        return Ok(child.wait()?);
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ToolError::Timeout {
                program: program.to_string(),
                seconds: limit.as_secs(),
            });
        }
        std::thread::sleep(WAIT_POLL);
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let start = trimmed.len() - STDERR_TAIL_BYTES;
    let start = trimmed
        .char_indices()
        .map(|(i, _)| i)
        .find(|&i| i >= start)
        .unwrap_or(start);
    format!("...{}", &trimmed[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_succeeds_for_a_true_exit() {
        let result = run_command(Command::new("true"), None, None);
        assert!(result.is_ok());
    }

    #[test]
    fn run_command_reports_nonzero_exit_with_program_name() {
        let result = run_command(Command::new("false"), None, None);
        match result {
            Err(ToolError::Exit { program, .. }) => assert_eq!(program, "false"),
            other => panic!("expected Exit error, got {:?}", other),
        }
    }

    #[test]
    fn run_command_reports_missing_binaries_as_launch_failures() {
        let result = run_command(Command::new("mdprep-no-such-binary"), None, None);
        assert!(matches!(result, Err(ToolError::Launch { .. })));
    }

    #[test]
    fn run_command_kills_processes_past_their_deadline() {
        let mut command = Command::new("sleep");
        command.arg("30");
        let started = Instant::now();
        let result = run_command(command, None, Some(Duration::from_millis(300)));
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn run_command_captures_stderr_from_stdin_driven_tools() {
        let mut command = Command::new("sh");
        command.args(["-c", "read line; echo \"$line\" >&2; exit 3"]);
        match run_command(command, Some("boom\n"), None) {
            Err(ToolError::Exit { stderr, .. }) => assert!(stderr.contains("boom")),
            other => panic!("expected Exit error, got {:?}", other),
        }
    }

    #[test]
    fn property_helpers_read_and_validate() {
        let props: toml::Table = toml::from_str("binary = \"gmx\"\ntimeout-sec = 5").unwrap();
        assert_eq!(prop_str(&props, "binary", "other"), "gmx");
        assert_eq!(prop_str(&props, "missing", "other"), "other");
        assert!(prop_bool(&props, "missing", true));
        assert_eq!(stage_timeout(&props).unwrap(), Some(Duration::from_secs(5)));

        let bad: toml::Table = toml::from_str("timeout-sec = \"soon\"").unwrap();
        assert!(matches!(
            stage_timeout(&bad),
            Err(ToolError::InvalidProperty { .. })
        ));
    }
}
