//! Builder for executing external tool commands.
//!
//! [`ToolCommand::execute`] captures output for short-lived commands such as
//! version checks. [`ToolCommand::execute_with_stderr_callback`] streams
//! stderr to a callback while the process runs and kills the process when the
//! cancellation token fires.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use em_core::{Error, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Number of trailing stderr lines kept for diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    /// Full stderr for [`ToolCommand::execute`]; the last lines only when
    /// streaming.
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// ```no_run
/// use em_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> em_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command with no timeout.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Kill the process if it runs longer than `d`.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn spawn(&self, stdout: Stdio) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn()
            .map_err(|e| Error::tool(self.program_name(), format!("failed to spawn: {e}")))
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] if the process cannot be spawned, exits non-zero, or
    /// exceeds the timeout.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let name = self.program_name();
        let child = self.spawn(Stdio::piped())?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| Error::tool(&name, format!("timed out after {limit:?}")))?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| Error::tool(&name, format!("I/O error waiting for process: {e}")))?;

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(Error::tool(
                name,
                format!(
                    "exited with status {}: {}",
                    output.status,
                    tool_output.stderr.trim()
                ),
            ));
        }

        Ok(tool_output)
    }

    /// Execute the command, handing every stderr line to `on_line` as soon as
    /// it is read.
    ///
    /// stdout is discarded. The last few stderr lines are kept and included
    /// in the error message on a non-zero exit.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cancel` fires; the process is killed first.
    /// - [`Error::Tool`] if the process cannot be spawned, exits non-zero, or
    ///   exceeds the timeout.
    pub async fn execute_with_stderr_callback<F>(
        &self,
        mut on_line: F,
        cancel: Option<&CancellationToken>,
    ) -> Result<ToolOutput>
    where
        F: FnMut(&str) + Send,
    {
        let name = self.program_name();
        let mut child = self.spawn(Stdio::null())?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool(&name, "stderr was not captured"))?;
        let mut reader = BufReader::new(stderr);

        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(cancelled);

        let deadline = async {
            match self.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf);
                        let line = line.trim_end_matches(['\r', '\n']);
                        on_line(line);
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line.to_string());
                    }
                    Err(e) => {
                        tracing::debug!(tool = %name, "stderr read failed: {e}");
                        break;
                    }
                },
                _ = &mut cancelled => {
                    kill(&mut child, &name).await;
                    return Err(Error::Cancelled);
                }
                _ = &mut deadline => {
                    kill(&mut child, &name).await;
                    let limit = self.timeout.unwrap_or_default();
                    return Err(Error::tool(&name, format!("timed out after {limit:?}")));
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status
                .map_err(|e| Error::tool(&name, format!("I/O error waiting for process: {e}")))?,
            _ = &mut cancelled => {
                kill(&mut child, &name).await;
                return Err(Error::Cancelled);
            }
        };

        let stderr = tail.into_iter().collect::<Vec<_>>().join("\n");
        if !status.success() {
            return Err(Error::tool(
                name,
                format!("exited with status {status}: {}", stderr.trim()),
            ));
        }

        Ok(ToolOutput {
            status,
            stdout: String::new(),
            stderr,
        })
    }
}

async fn kill(child: &mut Child, name: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(tool = %name, "failed to kill process: {e}");
    }
}
