//! Job scheduler integration tests: discovery, single active run per
//! video, recovery, bounded concurrency, and deletion during a run.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{test_config, TestHarness};
use em_core::events::EventPayload;
use em_core::VideoState;
use em_db::queries::videos;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn scan_dispatches_every_unencoded_video() {
    let harness = TestHarness::new();
    let enc = harness.encoder("copy", &[("-out.mp4", "-c copy")]);
    let a = harness.video(&harness.source("a.mp4"), &enc);
    let b = harness.video(&harness.source("b.mp4"), &enc);

    let shutdown = CancellationToken::new();
    let mut dispatched = harness.ctx.scheduler.scan_once(&shutdown).unwrap();
    dispatched.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(dispatched, expected);

    for id in [a.id, b.id] {
        let video = harness.wait_for(id, |v| v.state == VideoState::Complete).await;
        assert_eq!(video.progress, 100);
    }
    harness.wait_idle().await;
}

#[tokio::test]
async fn repeated_scan_does_not_dispatch_twice() {
    let harness = TestHarness::new();
    let enc = harness.encoder("slow", &[("-out.mp4", "block")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);

    let shutdown = CancellationToken::new();
    assert_eq!(harness.ctx.scheduler.scan_once(&shutdown).unwrap(), vec![video.id]);
    assert!(harness.ctx.scheduler.scan_once(&shutdown).unwrap().is_empty());
    assert_eq!(harness.ctx.scheduler.active_count(), 1);

    harness.transcoder.release.cancel();
    harness.wait_for(video.id, |v| v.state == VideoState::Complete).await;
    harness.wait_idle().await;
    assert_eq!(harness.transcoder.calls().len(), 1);
}

#[tokio::test]
async fn concurrent_dispatch_starts_one_run() {
    let harness = TestHarness::new();
    let enc = harness.encoder("slow", &[("-out.mp4", "block")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);
    let shutdown = CancellationToken::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let scheduler = Arc::clone(&harness.ctx.scheduler);
        let video = video.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            scheduler.dispatch(&video, &shutdown).unwrap()
        }));
    }

    let mut started = 0;
    for handle in handles {
        if handle.await.unwrap() {
            started += 1;
        }
    }
    assert_eq!(started, 1);

    harness.transcoder.release.cancel();
    harness.wait_for(video.id, |v| v.state == VideoState::Complete).await;
    harness.wait_idle().await;
    assert_eq!(harness.transcoder.calls().len(), 1);
}

#[tokio::test]
async fn concurrency_limit_bounds_live_runs() {
    let mut config = test_config();
    config.scheduler.max_concurrent = 2;
    let harness = TestHarness::with_config(config);
    let enc = harness.encoder("slow", &[("-out.mp4", "block")]);
    let ids: Vec<_> = (0..4)
        .map(|i| harness.video(&harness.source(&format!("v{i}.mp4")), &enc).id)
        .collect();

    let shutdown = CancellationToken::new();
    assert_eq!(harness.ctx.scheduler.scan_once(&shutdown).unwrap().len(), 2);
    assert!(harness.ctx.scheduler.scan_once(&shutdown).unwrap().is_empty());

    harness.transcoder.release.cancel();
    harness.wait_idle().await;
    assert_eq!(harness.ctx.scheduler.scan_once(&shutdown).unwrap().len(), 2);

    for id in ids {
        harness.wait_for(id, |v| v.state == VideoState::Complete).await;
    }
    harness.wait_idle().await;
    assert!(harness.transcoder.peak() <= 2);
}

#[tokio::test]
async fn recovery_resets_interrupted_videos_before_scanning() {
    let harness = TestHarness::new();
    let enc = harness.encoder("copy", &[("-out.mp4", "-c copy")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);
    {
        let conn = harness.conn();
        videos::mark_encoding(&conn, video.id).unwrap();
        videos::update_progress(&conn, video.id, 63).unwrap();
    }

    // A plain scan leaves an `encoding` video alone.
    let shutdown = CancellationToken::new();
    assert!(harness.ctx.scheduler.scan_once(&shutdown).unwrap().is_empty());

    let handle = Arc::clone(&harness.ctx.scheduler).spawn(shutdown.clone());
    let done = harness.wait_for(video.id, |v| v.state == VideoState::Complete).await;
    assert_eq!(done.progress, 100);
    assert!(harness
        .ctx
        .event_bus
        .recent_events(100)
        .iter()
        .any(|e| e.payload == EventPayload::VideoRecovered { count: 1 }));

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn recover_is_a_noop_without_interrupted_videos() {
    let harness = TestHarness::new();
    let enc = harness.encoder("copy", &[("-out.mp4", "-c copy")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);

    assert_eq!(harness.ctx.scheduler.recover().unwrap(), 0);
    assert_eq!(harness.get(video.id).unwrap().state, VideoState::Unencoded);
}

#[tokio::test]
async fn enqueue_wakes_running_scheduler() {
    let mut config = test_config();
    config.scheduler.poll_interval_secs = 3600;
    let harness = TestHarness::with_config(config);
    let enc = harness.encoder("copy", &[("-out.mp4", "-c copy")]);

    let shutdown = CancellationToken::new();
    let handle = Arc::clone(&harness.ctx.scheduler).spawn(shutdown.clone());
    // Let the first empty scan happen.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let source = harness.source("a.mp4");
    let video = harness
        .ctx
        .enqueue_video(&source.to_string_lossy(), enc.id, None)
        .unwrap();
    harness.wait_for(video.id, |v| v.state == VideoState::Complete).await;

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_cancels_live_runs_and_leaves_them_encoding() {
    let harness = TestHarness::new();
    let enc = harness.encoder("slow", &[("-out.mp4", "block")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);

    let shutdown = CancellationToken::new();
    harness.ctx.scheduler.scan_once(&shutdown).unwrap();
    harness.wait_for(video.id, |v| v.state == VideoState::Encoding).await;

    shutdown.cancel();
    harness.wait_idle().await;
    assert_eq!(harness.get(video.id).unwrap().state, VideoState::Encoding);

    // The next start's recovery sweep makes it eligible again.
    assert_eq!(harness.ctx.scheduler.recover().unwrap(), 1);
    let video = harness.get(video.id).unwrap();
    assert_eq!(video.state, VideoState::Unencoded);
    assert_eq!(video.progress, 0);
}

#[tokio::test]
async fn deleting_a_video_mid_run_discards_the_run() {
    let harness = TestHarness::new();
    let enc = harness.encoder("slow", &[("-a.mp4", "block"), ("-b.mp4", "-c copy")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);

    let shutdown = CancellationToken::new();
    harness.ctx.scheduler.scan_once(&shutdown).unwrap();
    harness.wait_for(video.id, |v| v.state == VideoState::Encoding).await;

    harness.ctx.delete_video(video.id).unwrap();
    harness.wait_idle().await;

    assert!(harness.get(video.id).is_none());
    // The second step never ran.
    assert_eq!(harness.transcoder.calls().len(), 1);
}

#[tokio::test]
async fn stale_dispatch_does_not_rerun_a_complete_video() {
    let harness = TestHarness::new();
    let enc = harness.encoder("copy", &[("-out.mp4", "-c copy")]);
    let stale = harness.video(&harness.source("a.mp4"), &enc);
    let shutdown = CancellationToken::new();

    assert!(harness.ctx.scheduler.dispatch(&stale, &shutdown).unwrap());
    harness.wait_for(stale.id, |v| v.state == VideoState::Complete).await;
    harness.wait_idle().await;

    // `stale` still says `unencoded`, as a row listed by an earlier scan would.
    harness.ctx.scheduler.dispatch(&stale, &shutdown).unwrap();
    harness.wait_idle().await;

    assert_eq!(harness.transcoder.calls().len(), 1);
    let video = harness.get(stale.id).unwrap();
    assert_eq!(video.state, VideoState::Complete);
    assert_eq!(video.progress, 100);
}

#[tokio::test]
async fn failed_delete_leaves_the_run_going() {
    let harness = TestHarness::new();
    let enc = harness.encoder("slow", &[("-out.mp4", "block")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);

    let shutdown = CancellationToken::new();
    harness.ctx.scheduler.scan_once(&shutdown).unwrap();
    harness.wait_for(video.id, |v| v.state == VideoState::Encoding).await;

    harness
        .conn()
        .execute_batch(
            "CREATE TRIGGER refuse_delete BEFORE DELETE ON videos
             BEGIN SELECT RAISE(ABORT, 'database is locked'); END;",
        )
        .unwrap();
    assert!(harness.ctx.delete_video(video.id).is_err());
    assert!(harness.ctx.scheduler.is_active(video.id));

    harness.conn().execute_batch("DROP TRIGGER refuse_delete;").unwrap();
    harness.transcoder.release.cancel();
    let done = harness.wait_for(video.id, |v| v.state == VideoState::Complete).await;
    assert_eq!(done.progress, 100);
    harness.wait_idle().await;
}

#[tokio::test]
async fn requeue_runs_a_failed_video_again() {
    let harness = TestHarness::new();
    let enc = harness.encoder("broken", &[("-out.mp4", "fail")]);
    let video = harness.video(&harness.source("a.mp4"), &enc);

    let shutdown = CancellationToken::new();
    harness.ctx.scheduler.scan_once(&shutdown).unwrap();
    let failed = harness.wait_for(video.id, |v| v.state == VideoState::Error).await;
    assert_eq!(failed.progress, 40);
    harness.wait_idle().await;

    let requeued = harness.ctx.requeue_video(video.id).unwrap();
    assert_eq!(requeued.state, VideoState::Unencoded);
    assert_eq!(requeued.progress, 0);
    assert!(requeued.error.is_none());

    // Only finished videos can be requeued.
    assert_matches!(
        harness.ctx.requeue_video(video.id),
        Err(em_core::Error::Conflict(_))
    );
}
