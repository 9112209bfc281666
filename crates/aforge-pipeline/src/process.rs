//! External process supervision.
//!
//! [`ProcessRunner`] owns exactly one invocation end-to-end: spawn,
//! stream output lines to the caller, enforce a deadline, honor
//! cancellation, and decide success. Success requires both a zero exit
//! status and an observed completion-marker line; exit codes alone are
//! not trusted.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ProcessError;

/// Description of one external program invocation.
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    completion_marker: String,
}

impl ProcessCommand {
    /// Create a command expecting `completion_marker` somewhere in the
    /// program's output before it exits.
    pub fn new(program: impl Into<String>, completion_marker: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            completion_marker: completion_marker.into(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn completion_marker(&self) -> &str {
        &self.completion_marker
    }
}

/// Runner for external commands with line streaming, a deadline, and
/// cancellation.
pub struct ProcessRunner {
    timeout: Duration,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl ProcessRunner {
    /// Create a runner whose whole invocation must finish within `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel_rx: None,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Run the command, feeding every stdout/stderr line to `on_line`
    /// as it arrives. The callback is the sole channel through which
    /// output reaches the caller.
    ///
    /// The child process is never left running past this call's return:
    /// timeout and cancellation kill it before the error is produced,
    /// and `kill_on_drop` covers the future itself being dropped.
    pub async fn run<F>(&self, cmd: &ProcessCommand, on_line: F) -> Result<(), ProcessError>
    where
        F: FnMut(&str) + Send + 'static,
    {
        which::which(&cmd.program).map_err(|_| ProcessError::BinaryNotFound {
            program: cmd.program.clone(),
        })?;

        debug!("Running: {} {}", cmd.program, cmd.args.join(" "));

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = cmd.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        let reader = tokio::spawn(stream_lines(
            stdout,
            stderr,
            cmd.completion_marker.clone(),
            on_line,
        ));

        let outcome = self.wait_for_exit(&mut child, cmd).await;

        // Lines buffered in the pipes at exit still count; drain to EOF
        // before judging the marker.
        let marker_seen = reader.await.unwrap_or(false);
        let status = outcome?;

        if !status.success() {
            return Err(ProcessError::Exit {
                program: cmd.program.clone(),
                code: status.code(),
            });
        }
        if !marker_seen {
            return Err(ProcessError::IncompleteOutput {
                program: cmd.program.clone(),
                marker: cmd.completion_marker.clone(),
            });
        }
        Ok(())
    }

    /// Wait for the child with deadline and cancellation; both kill the
    /// process before returning their error.
    async fn wait_for_exit(
        &self,
        child: &mut Child,
        cmd: &ProcessCommand,
    ) -> Result<std::process::ExitStatus, ProcessError> {
        let mut cancel_rx = self.cancel_rx.clone();

        let interrupt = tokio::select! {
            status = child.wait() => return Ok(status?),
            _ = tokio::time::sleep(self.timeout) => ProcessError::Timeout {
                program: cmd.program.clone(),
                secs: self.timeout.as_secs(),
            },
            _ = cancelled(&mut cancel_rx) => ProcessError::Cancelled {
                program: cmd.program.clone(),
            },
        };

        // The wait future is gone once the select settles, so the child
        // can be killed and reaped here.
        match &interrupt {
            ProcessError::Timeout { secs, .. } => warn!(
                "'{}' timed out after {} seconds, killing process",
                cmd.program, secs
            ),
            _ => info!("'{}' cancelled, killing process", cmd.program),
        }
        kill_child(child, &cmd.program).await;
        Err(interrupt)
    }
}

/// Kill and reap the child.
async fn kill_child(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill '{}': {}", program, e);
    }
}

/// Resolve once the cancellation flag flips to true; never resolves
/// without a receiver or after the sender is gone.
async fn cancelled(cancel_rx: &mut Option<watch::Receiver<bool>>) {
    match cancel_rx {
        Some(rx) => loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        None => std::future::pending().await,
    }
}

/// Stream both pipes line-by-line into the callback until EOF, noting
/// whether any line carried the completion marker.
async fn stream_lines<F>(
    stdout: ChildStdout,
    stderr: ChildStderr,
    marker: String,
    mut on_line: F,
) -> bool
where
    F: FnMut(&str) + Send + 'static,
{
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_done = false;
    let mut err_done = false;
    let mut marker_seen = false;

    while !(out_done && err_done) {
        let line = tokio::select! {
            line = out_lines.next_line(), if !out_done => match line {
                Ok(Some(line)) => Some(line),
                _ => {
                    out_done = true;
                    None
                }
            },
            line = err_lines.next_line(), if !err_done => match line {
                Ok(Some(line)) => Some(line),
                _ => {
                    err_done = true;
                    None
                }
            },
        };

        if let Some(line) = line {
            if !marker_seen && line.contains(&marker) {
                marker_seen = true;
            }
            on_line(&line);
        }
    }

    marker_seen
}
