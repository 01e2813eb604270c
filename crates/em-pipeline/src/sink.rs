//! Where the runner writes video state and announces completion.
//!
//! Every `VideoRecorder` write returns `Ok(false)` when the video no longer
//! exists; the runner then stops and discards its result.

use em_core::{Result, VideoId};

/// Persists a video's lifecycle state and progress.
pub trait VideoRecorder: Send + Sync {
    /// `encoding`, progress 0. `Ok(false)` also when the video is not
    /// `unencoded`; the run then does nothing.
    fn mark_encoding(&self, id: VideoId) -> Result<bool>;

    /// Overwrite the progress field.
    fn record_progress(&self, id: VideoId, progress: u8) -> Result<bool>;

    /// `complete`, progress 100.
    fn mark_complete(&self, id: VideoId) -> Result<bool>;

    /// `error` with a diagnostic.
    fn mark_failed(&self, id: VideoId, diagnostic: &str) -> Result<bool>;
}

/// Told once when a video has finished its whole chain.
pub trait CompletionNotifier: Send + Sync {
    fn notify_complete(&self, video_id: VideoId);
}
