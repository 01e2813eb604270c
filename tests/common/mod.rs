//! Shared test harness for integration tests.
//!
//! [`TestHarness`] builds a full [`AppContext`] on a file-backed database in
//! a temp dir (runs write from several tasks at once, which needs WAL). By
//! default steps run through [`FakeTranscoder`]; the `ffmpeg` constructors
//! use the real ffmpeg transcoder pointed at a shell script.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use em_av::ToolRegistry;
use em_core::config::Config;
use em_core::{Error, Result, VideoId};
use em_db::models::{Encoder, Video};
use em_db::pool::{get_conn, init_pool, DbPool, PooledConnection};
use em_db::queries::{encoders, encoding_tasks, videos};
use em_pipeline::{ProgressSender, TaskStep, Transcoder};
use em_server::context::AppContext;
use em_server::router::build_router;

// ---------------------------------------------------------------------------
// FakeTranscoder
// ---------------------------------------------------------------------------

/// Copies input to output and reports 50% then 100%.
///
/// A step whose command is `fail` reports 40% and fails; `block` waits until
/// [`FakeTranscoder::release`] or cancellation.
#[derive(Default)]
pub struct FakeTranscoder {
    pub release: CancellationToken,
    calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeTranscoder {
    pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
        self.calls.lock().clone()
    }

    /// Highest number of steps that were ever running at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn perform(
        &self,
        step: &TaskStep,
        input: &Path,
        output: &Path,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        match step.command.as_str() {
            "fail" => {
                progress.send(40);
                return Err(Error::execution_failed("ffmpeg exited with status 1"));
            }
            "block" => {
                progress.send(10);
                tokio::select! {
                    _ = self.release.cancelled() => {}
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                }
            }
            _ => {}
        }

        progress.send(50);
        tokio::fs::copy(input, output).await?;
        progress.send(100);
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn run(
        &self,
        step: &TaskStep,
        input: &Path,
        output: &Path,
        progress: &ProgressSender,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if !input.is_file() {
            return Err(Error::missing_input(input));
        }
        self.calls
            .lock()
            .push((input.to_path_buf(), output.to_path_buf()));

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = self.perform(step, input, output, progress, cancel).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// TestHarness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub transcoder: Arc<FakeTranscoder>,
    pub dir: tempfile::TempDir,
}

impl TestHarness {
    /// Default configuration with a fast poll interval.
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let db = open_db(dir.path());
        let transcoder = Arc::new(FakeTranscoder::default());
        let ctx = AppContext::with_transcoder(
            db.clone(),
            config,
            Arc::new(ToolRegistry::default()),
            transcoder.clone(),
        );

        Self {
            ctx,
            db,
            transcoder,
            dir,
        }
    }

    /// Harness whose steps run through the ffmpeg transcoder, using a shell
    /// script written into the temp dir as ffmpeg.
    #[cfg(unix)]
    pub fn with_fake_ffmpeg(config: Config, script_body: &str) -> Self {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let ffmpeg = dir.path().join("ffmpeg");
        std::fs::write(&ffmpeg, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

        let db = open_db(dir.path());
        let tools = Arc::new(ToolRegistry::with_paths([("ffmpeg".to_string(), ffmpeg)]));
        let ctx = AppContext::new(db.clone(), config, tools);

        Self {
            ctx,
            db,
            transcoder: Arc::new(FakeTranscoder::default()),
            dir,
        }
    }

    /// Serve the router on a random port.
    pub async fn with_server() -> (Self, SocketAddr) {
        let harness = Self::new();
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.db).expect("failed to get db connection")
    }

    /// Create an encoder whose chain is `steps` as `(suffix, command)` pairs.
    pub fn encoder(&self, name: &str, steps: &[(&str, &str)]) -> Encoder {
        let conn = self.conn();
        let encoder = encoders::create_encoder(&conn, name).unwrap();
        for (i, (suffix, command)) in steps.iter().enumerate() {
            encoding_tasks::append_task(&conn, encoder.id, &format!("step{}", i + 1), suffix, command)
                .unwrap();
        }
        encoder
    }

    /// Write a source file into the temp dir.
    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, b"source video").unwrap();
        path
    }

    /// Insert an `unencoded` video directly, bypassing the scheduler wakeup.
    pub fn video(&self, file: &Path, encoder: &Encoder) -> Video {
        videos::create_video(&self.conn(), &file.to_string_lossy(), encoder.id, None).unwrap()
    }

    pub fn get(&self, id: VideoId) -> Option<Video> {
        videos::get_video(&self.conn(), id).unwrap()
    }

    /// Poll until `id` satisfies `done`, panicking after five seconds.
    pub async fn wait_for(&self, id: VideoId, done: impl Fn(&Video) -> bool) -> Video {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(video) = self.get(id) {
                if done(&video) {
                    return video;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for video {id}: {:?}",
                self.get(id)
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Poll until the scheduler has no live runs.
    pub async fn wait_idle(&self) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.ctx.scheduler.active_count() > 0 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "scheduler still has {} active runs",
                self.ctx.scheduler.active_count()
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.scheduler.poll_interval_secs = 1;
    config
}

fn open_db(dir: &Path) -> DbPool {
    let path = dir.join("test.db");
    init_pool(&path).expect("failed to create database")
}
