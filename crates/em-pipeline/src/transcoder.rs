//! The seam between the runner and the external transcode tool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use em_av::ToolRegistry;
use em_core::Result;
use tokio_util::sync::CancellationToken;

use crate::chain::TaskStep;
use crate::progress::ProgressSender;

/// Runs one task step from `input` to `output`.
///
/// Implementations only report progress; they never touch video records.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the path of the produced file.
    async fn run(
        &self,
        step: &TaskStep,
        input: &Path,
        output: &Path,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

/// Runs steps through ffmpeg.
pub struct FfmpegTranscoder {
    tools: Arc<ToolRegistry>,
}

impl FfmpegTranscoder {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(
        &self,
        step: &TaskStep,
        input: &Path,
        output: &Path,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let ffmpeg = self.tools.require("ffmpeg")?;
        em_av::transcode_with_progress(
            ffmpeg,
            &step.command,
            input,
            output,
            |pct| progress.send(pct),
            Some(cancel),
        )
        .await?;
        Ok(output.to_path_buf())
    }
}
