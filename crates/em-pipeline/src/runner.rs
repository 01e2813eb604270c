//! Pipeline runner: drives one video through its task chain.
//!
//! Steps run strictly in chain order. The first step reads the video's
//! source file and each later step reads the file produced by the step
//! before it. The loop exits at the first failure.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use em_core::{Error, ProgressMode, Result, VideoId};
use tokio_util::sync::CancellationToken;

use crate::chain::TaskChain;
use crate::progress::ProgressSender;
use crate::sink::{CompletionNotifier, VideoRecorder};
use crate::transcoder::Transcoder;

/// The video to encode.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub video_id: VideoId,
    pub source: PathBuf,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step succeeded; the video is `complete`.
    Complete,
    /// A step failed; the video is `error` with this diagnostic.
    Failed(String),
    /// The run was cancelled and left the record as it was.
    Cancelled,
    /// The video disappeared mid-run, or was no longer `unencoded` when
    /// the run started; nothing further was written.
    Discarded,
}

pub struct PipelineRunner {
    transcoder: Arc<dyn Transcoder>,
    recorder: Arc<dyn VideoRecorder>,
    notifier: Arc<dyn CompletionNotifier>,
    progress_mode: ProgressMode,
}

impl PipelineRunner {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        recorder: Arc<dyn VideoRecorder>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        Self {
            transcoder,
            recorder,
            notifier,
            progress_mode: ProgressMode::default(),
        }
    }

    /// Builder: choose how step progress maps onto the video.
    pub fn with_progress_mode(mut self, mode: ProgressMode) -> Self {
        self.progress_mode = mode;
        self
    }

    /// Run `chain` against the video in `request`.
    ///
    /// A chain with no steps completes immediately.
    ///
    /// # Errors
    ///
    /// Only recorder failures are returned as errors. Step failures become
    /// [`RunOutcome::Failed`].
    pub async fn execute(
        &self,
        request: &RunRequest,
        chain: &TaskChain,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let id = request.video_id;

        if cancel.is_cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        if !self.recorder.mark_encoding(id)? {
            return Ok(RunOutcome::Discarded);
        }

        tracing::info!(
            video_id = %id,
            encoder = %chain.name(),
            steps = chain.len(),
            "Encoding started"
        );

        // Cancelled by the caller, or by the progress callback when the
        // record has gone away.
        let run_cancel = cancel.child_token();
        let gone = Arc::new(AtomicBool::new(false));
        let total = chain.len();
        let mut input = request.source.clone();
        let mut current = chain.first();
        let mut index = 0;

        while let Some(step) = current {
            if run_cancel.is_cancelled() {
                return Ok(self.interrupted(id, &gone));
            }

            let output = TaskChain::output_path_for(&request.source, step);
            let progress = self.progress_sender(id, index, total, &gone, &run_cancel);

            tracing::info!(
                video_id = %id,
                step = %step.label(),
                input = %input.display(),
                output = %output.display(),
                "Running encoding step"
            );

            match self
                .transcoder
                .run(step, &input, &output, &progress, &run_cancel)
                .await
            {
                Ok(produced) => input = produced,
                Err(Error::Cancelled) => return Ok(self.interrupted(id, &gone)),
                Err(e) => {
                    let reason = format!("step {} failed: {e}", step.label());
                    tracing::warn!(video_id = %id, "Encoding failed: {reason}");
                    return Ok(if self.recorder.mark_failed(id, &reason)? {
                        RunOutcome::Failed(reason)
                    } else {
                        RunOutcome::Discarded
                    });
                }
            }

            if gone.load(Ordering::SeqCst) {
                return Ok(RunOutcome::Discarded);
            }

            current = chain.next_after(step);
            index += 1;
        }

        if !self.recorder.mark_complete(id)? {
            return Ok(RunOutcome::Discarded);
        }

        tracing::info!(video_id = %id, encoder = %chain.name(), "Encoding complete");
        self.notifier.notify_complete(id);
        Ok(RunOutcome::Complete)
    }

    fn interrupted(&self, id: VideoId, gone: &AtomicBool) -> RunOutcome {
        if gone.load(Ordering::SeqCst) {
            tracing::info!(video_id = %id, "Video removed during encoding; discarding result");
            RunOutcome::Discarded
        } else {
            tracing::info!(video_id = %id, "Encoding cancelled");
            RunOutcome::Cancelled
        }
    }

    /// Progress callback for the step at `index`: writes through the
    /// recorder and stops the run if the record is gone.
    fn progress_sender(
        &self,
        id: VideoId,
        index: usize,
        total: usize,
        gone: &Arc<AtomicBool>,
        run_cancel: &CancellationToken,
    ) -> ProgressSender {
        let recorder = Arc::clone(&self.recorder);
        let mode = self.progress_mode;
        let gone = Arc::clone(gone);
        let run_cancel = run_cancel.clone();

        ProgressSender::new(move |pct| {
            let value = mode.overall(index, total, pct);
            match recorder.record_progress(id, value) {
                Ok(true) => {}
                Ok(false) => {
                    gone.store(true, Ordering::SeqCst);
                    run_cancel.cancel();
                }
                Err(e) => tracing::warn!(video_id = %id, "Failed to record progress: {e}"),
            }
        })
    }
}
