//! Run a single encoding step through ffmpeg.

use std::path::Path;

use em_core::{Error, Result};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::progress::ProgressParser;
use crate::template;

/// Transcode `input` into `output` with the task's `command` arguments.
///
/// `on_progress` receives whole percentages as ffmpeg reports them, never
/// decreasing. Any partial output is removed when the step fails.
///
/// # Errors
///
/// - [`Error::MissingInput`] if `input` does not exist.
/// - [`Error::ExecutionFailed`] if the command template is malformed,
///   ffmpeg cannot be started, exits non-zero, or leaves no output file.
/// - [`Error::Cancelled`] if `cancel` fires; ffmpeg is killed.
pub async fn transcode_with_progress<F>(
    ffmpeg: &Path,
    command: &str,
    input: &Path,
    output: &Path,
    mut on_progress: F,
    cancel: Option<&CancellationToken>,
) -> Result<()>
where
    F: FnMut(u8) + Send,
{
    if !input.is_file() {
        return Err(Error::missing_input(input));
    }
    if input == output {
        return Err(Error::execution_failed(format!(
            "output path {} is the same as the input",
            output.display()
        )));
    }

    let args = template::build_args(command, input, output)
        .map_err(|e| Error::execution_failed(format!("invalid command template: {e}")))?;

    remove_stale(output).await;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        args = ?args,
        "Running ffmpeg"
    );

    let mut parser = ProgressParser::new();
    let result = ToolCommand::new(ffmpeg.to_path_buf())
        .args(args)
        .execute_with_stderr_callback(
            |line| {
                if let Some(pct) = parser.feed(line) {
                    on_progress(pct);
                }
            },
            cancel,
        )
        .await;

    match result {
        Ok(_) => {}
        Err(Error::Cancelled) => {
            remove_stale(output).await;
            return Err(Error::Cancelled);
        }
        Err(Error::Tool { tool, message }) => {
            remove_stale(output).await;
            return Err(Error::execution_failed(format!("{tool} {message}")));
        }
        Err(e) => {
            remove_stale(output).await;
            return Err(e);
        }
    }

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => {
            remove_stale(output).await;
            Err(Error::execution_failed(format!(
                "ffmpeg produced an empty output at {}",
                output.display()
            )))
        }
        Err(_) => Err(Error::execution_failed(format!(
            "ffmpeg produced no output at {}",
            output.display()
        ))),
    }
}

async fn remove_stale(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed stale output {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {e}", path.display()),
    }
}
