//! Application context shared by route handlers, the CLI, and the scheduler.
//!
//! [`AppContext`] wraps the DB pool, tools, event bus, and scheduler in
//! `Arc`s. The video operations that must coordinate with live runs
//! (enqueue, requeue, delete) live here so every surface goes through the
//! same path.

use std::sync::Arc;

use em_av::ToolRegistry;
use em_core::config::Config;
use em_core::events::{EventBus, EventPayload};
use em_core::{EncoderId, Error, Result, VideoId, VideoState};
use em_db::models::Video;
use em_db::pool::{get_conn, DbPool};
use em_db::queries::videos;
use em_pipeline::{FfmpegTranscoder, PipelineRunner, Transcoder};

use crate::notifications::CompletionHooks;
use crate::recorder::DbVideoRecorder;
use crate::scheduler::JobScheduler;

#[derive(Clone)]
pub struct AppContext {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub event_bus: Arc<EventBus>,
    pub tools: Arc<ToolRegistry>,
    pub scheduler: Arc<JobScheduler>,
}

impl AppContext {
    /// Build a context that encodes with ffmpeg from `tools`.
    pub fn new(db: DbPool, config: Config, tools: Arc<ToolRegistry>) -> Self {
        let transcoder = Arc::new(FfmpegTranscoder::new(Arc::clone(&tools)));
        Self::with_transcoder(db, config, tools, transcoder)
    }

    /// Build a context around any [`Transcoder`].
    pub fn with_transcoder(
        db: DbPool,
        config: Config,
        tools: Arc<ToolRegistry>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::default());
        let recorder = Arc::new(DbVideoRecorder::new(db.clone(), Arc::clone(&event_bus)));
        let notifier = Arc::new(CompletionHooks::new(
            db.clone(),
            Arc::clone(&event_bus),
            &config.notifications,
        ));
        let runner = PipelineRunner::new(transcoder, recorder, notifier)
            .with_progress_mode(config.pipeline.progress_mode);
        let scheduler = Arc::new(JobScheduler::new(
            db.clone(),
            runner,
            Arc::clone(&event_bus),
            config.scheduler.clone(),
        ));

        Self {
            db,
            config: Arc::new(config),
            event_bus,
            tools,
            scheduler,
        }
    }

    /// Queue a new video for encoding and nudge the scheduler.
    pub fn enqueue_video(
        &self,
        file: &str,
        encoder_id: EncoderId,
        callback_url: Option<&str>,
    ) -> Result<Video> {
        let video = {
            let conn = get_conn(&self.db)?;
            videos::create_video(&conn, file, encoder_id, callback_url)?
        };

        tracing::info!(video_id = %video.id, file = %video.file, "Video queued");
        self.event_bus
            .broadcast(EventPayload::VideoQueued { video_id: video.id });
        self.scheduler.wake();
        Ok(video)
    }

    /// Put a `complete` or `error` video back in the queue.
    pub fn requeue_video(&self, id: VideoId) -> Result<Video> {
        if self.scheduler.is_active(id) {
            return Err(Error::Conflict(format!("video {id} is being encoded")));
        }

        let conn = get_conn(&self.db)?;
        if !videos::requeue_video(&conn, id)? {
            return match videos::get_video(&conn, id)? {
                Some(v) => Err(Error::Conflict(format!(
                    "video {id} is {} and cannot be requeued",
                    v.state
                ))),
                None => Err(Error::not_found("video", id)),
            };
        }
        let video = videos::get_video(&conn, id)?.ok_or_else(|| Error::not_found("video", id))?;
        drop(conn);

        tracing::info!(video_id = %id, "Video requeued");
        self.event_bus
            .broadcast(EventPayload::VideoQueued { video_id: id });
        self.scheduler.wake();
        Ok(video)
    }

    /// Delete a video, then stop its run if one is live.
    ///
    /// If the delete fails the run is left alone. A run that is mid-step
    /// when the row disappears discards its result on its next write.
    pub fn delete_video(&self, id: VideoId) -> Result<()> {
        let conn = get_conn(&self.db)?;
        if !videos::delete_video(&conn, id)? {
            return Err(Error::not_found("video", id));
        }

        // A cancelled run writes nothing, so cancel only once the row is gone.
        if self.scheduler.cancel(id) {
            tracing::info!(video_id = %id, "Cancelled live run for deleted video");
        }

        tracing::info!(video_id = %id, "Video deleted");
        self.event_bus
            .broadcast(EventPayload::VideoDeleted { video_id: id });
        Ok(())
    }

    /// Fetch one video.
    pub fn video(&self, id: VideoId) -> Result<Video> {
        let conn = get_conn(&self.db)?;
        videos::get_video(&conn, id)?.ok_or_else(|| Error::not_found("video", id))
    }

    /// Videos in `state`, oldest first, or the most recent videos.
    pub fn list_videos(&self, state: Option<VideoState>, limit: i64) -> Result<Vec<Video>> {
        let conn = get_conn(&self.db)?;
        match state {
            Some(state) => {
                let mut rows = videos::list_videos_by_state(&conn, state)?;
                rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
                Ok(rows)
            }
            None => videos::list_recent_videos(&conn, limit),
        }
    }
}
