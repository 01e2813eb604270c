//! Background job scheduler.
//!
//! Polls the database for `unencoded` videos and hands each one to the
//! [`PipelineRunner`] on its own task. The active map is the single source of
//! truth for "this video has a live run in this process": a video is only
//! dispatched through the map's entry API, so concurrent scans can never
//! start two runs for the same video.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use em_core::config::SchedulerConfig;
use em_core::events::{EventBus, EventPayload};
use em_core::{EncoderId, Error, Result, VideoId, VideoState};
use em_db::models::Video;
use em_db::pool::{get_conn, DbPool};
use em_db::queries::{encoders, encoding_tasks, videos};
use em_pipeline::{PipelineRunner, RunOutcome, RunRequest, TaskChain, TaskStep};

/// Owns the set of live runs and the polling loop.
pub struct JobScheduler {
    db: DbPool,
    runner: PipelineRunner,
    event_bus: Arc<EventBus>,
    config: SchedulerConfig,
    active: DashMap<VideoId, CancellationToken>,
    limiter: Option<Arc<Semaphore>>,
    wake: Notify,
}

/// Removes a video from the active map when its run task ends, even if the
/// run panicked.
struct ActiveGuard {
    scheduler: Arc<JobScheduler>,
    video_id: VideoId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.scheduler.active.remove(&self.video_id);
    }
}

impl JobScheduler {
    pub fn new(
        db: DbPool,
        runner: PipelineRunner,
        event_bus: Arc<EventBus>,
        config: SchedulerConfig,
    ) -> Self {
        let limiter = config
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));

        Self {
            db,
            runner,
            event_bus,
            config,
            active: DashMap::new(),
            limiter,
            wake: Notify::new(),
        }
    }

    /// Reset every video left in `encoding` by a previous process.
    ///
    /// Must run before the first scan. Returns the number of videos reset.
    pub fn recover(&self) -> Result<usize> {
        let conn = get_conn(&self.db)?;
        let count = videos::reset_encoding_videos(&conn)?;
        if count > 0 {
            tracing::info!(count, "Reset interrupted videos to unencoded");
            self.event_bus
                .broadcast(EventPayload::VideoRecovered { count });
        }
        Ok(count)
    }

    /// Discover `unencoded` videos and dispatch every one that is not
    /// already running.
    ///
    /// Returns the IDs dispatched by this call.
    pub fn scan_once(self: &Arc<Self>, shutdown: &CancellationToken) -> Result<Vec<VideoId>> {
        let pending = {
            let conn = get_conn(&self.db)?;
            videos::list_videos_by_state(&conn, VideoState::Unencoded)?
        };

        let mut dispatched = Vec::new();
        for video in &pending {
            match self.dispatch(video, shutdown) {
                Ok(true) => dispatched.push(video.id),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(video_id = %video.id, "Failed to dispatch video: {e}");
                }
            }
        }

        Ok(dispatched)
    }

    /// Start a run for `video` unless one is already live or the
    /// concurrency bound is reached.
    ///
    /// Returns `true` if a run was started.
    pub fn dispatch(self: &Arc<Self>, video: &Video, shutdown: &CancellationToken) -> Result<bool> {
        let permit = match &self.limiter {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(p) => Some(p),
                Err(_) => return Ok(false),
            },
            None => None,
        };

        let cancel = match self.active.entry(video.id) {
            Entry::Occupied(_) => return Ok(false),
            Entry::Vacant(slot) => {
                let token = shutdown.child_token();
                slot.insert(token.clone());
                token
            }
        };

        let guard = ActiveGuard {
            scheduler: Arc::clone(self),
            video_id: video.id,
        };

        let chain = match self.load_chain(video.encoder_id) {
            Ok(chain) => chain,
            Err(e) => {
                drop(guard);
                return Err(e);
            }
        };

        let request = RunRequest {
            video_id: video.id,
            source: video.file_path(),
        };

        tracing::debug!(
            video_id = %video.id,
            encoder = %chain.name(),
            "Dispatching video"
        );

        tokio::spawn(async move {
            let scheduler = Arc::clone(&guard.scheduler);

            match scheduler.runner.execute(&request, &chain, &cancel).await {
                Ok(RunOutcome::Complete) => {}
                Ok(RunOutcome::Failed(reason)) => {
                    tracing::debug!(video_id = %request.video_id, "Run failed: {reason}");
                }
                Ok(RunOutcome::Cancelled) => {
                    tracing::debug!(video_id = %request.video_id, "Run cancelled");
                }
                Ok(RunOutcome::Discarded) => {
                    tracing::debug!(video_id = %request.video_id, "Run discarded");
                }
                Err(e) => {
                    tracing::error!(video_id = %request.video_id, "Run aborted: {e}");
                }
            }

            // Permit first: once the map shrinks, a new dispatch must succeed.
            drop(permit);
            drop(guard);
        });

        Ok(true)
    }

    /// Snapshot an encoder's task chain from the database.
    fn load_chain(&self, encoder_id: EncoderId) -> Result<TaskChain> {
        let conn = get_conn(&self.db)?;
        let encoder = encoders::get_encoder(&conn, encoder_id)?
            .ok_or_else(|| Error::not_found("encoder", encoder_id))?;
        let steps = encoding_tasks::list_tasks_for_encoder(&conn, encoder_id)?
            .into_iter()
            .map(|t| TaskStep {
                id: t.id,
                position: t.position,
                name: t.name,
                output_suffix: t.output_file_suffix,
                command: t.command,
            })
            .collect();
        Ok(TaskChain::new(encoder.id, encoder.name, steps))
    }

    /// Cancel a live run. Returns `false` if the video has none.
    pub fn cancel(&self, id: VideoId) -> bool {
        match self.active.get(&id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, id: VideoId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Trigger a scan without waiting for the poll interval.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Recovery sweep followed by the polling loop, until `shutdown` fires.
    ///
    /// Discovery errors are logged and retried on the next tick. Runs that
    /// are live at shutdown are cancelled through their child tokens.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(
            poll_interval_secs = self.config.poll_interval().as_secs(),
            max_concurrent = self.config.max_concurrent,
            "Job scheduler started"
        );

        if self.config.recover_on_start {
            if let Err(e) = self.recover() {
                tracing::error!("Recovery sweep failed: {e}");
            }
        }

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.scan_once(&shutdown) {
                Ok(dispatched) if !dispatched.is_empty() => {
                    tracing::info!(count = dispatched.len(), "Dispatched videos");
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Video discovery failed: {e}"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
                _ = self.wake.notified() => {}
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!("Job scheduler stopped");
    }

    /// Spawn [`JobScheduler::run`] onto the runtime.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
