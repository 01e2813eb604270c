//! Video record operations.
//!
//! The `mark_*`, `update_progress`, `complete_video` and `fail_video` writes
//! belong to the pipeline runner. Each returns `false` when the row no
//! longer exists, which the runner treats as "the video was deleted".
//! `mark_encoding` also returns `false` when the video is not `unencoded`.

use chrono::Utc;
use em_core::{EncoderId, Error, Result, VideoId, VideoState};
use rusqlite::Connection;

use super::is_constraint_violation;
use crate::models::Video;

const COLS: &str = "id, file, encoder_id, state, progress, error, callback_url,
    created_at, started_at, completed_at";

/// Default page size for [`list_recent_videos`].
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Create a new `unencoded` video attached to an encoder.
pub fn create_video(
    conn: &Connection,
    file: &str,
    encoder_id: EncoderId,
    callback_url: Option<&str>,
) -> Result<Video> {
    let file = file.trim();
    if file.is_empty() {
        return Err(Error::Validation("video file is required".into()));
    }

    let id = VideoId::new();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO videos (id, file, encoder_id, state, progress, callback_url, created_at)
         VALUES (?1, ?2, ?3, 'unencoded', 0, ?4, ?5)",
        rusqlite::params![id.to_string(), file, encoder_id.to_string(), callback_url, &now],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            Error::not_found("encoder", encoder_id)
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Video {
        id,
        file: file.to_string(),
        encoder_id,
        state: VideoState::Unencoded,
        progress: 0,
        error: None,
        callback_url: callback_url.map(str::to_string),
        created_at: now,
        started_at: None,
        completed_at: None,
    })
}

pub fn get_video(conn: &Connection, id: VideoId) -> Result<Option<Video>> {
    let q = format!("SELECT {COLS} FROM videos WHERE id = ?1");
    match conn.query_row(&q, [id.to_string()], Video::from_row) {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// All videos in `state`, oldest first.
pub fn list_videos_by_state(conn: &Connection, state: VideoState) -> Result<Vec<Video>> {
    let q = format!("SELECT {COLS} FROM videos WHERE state = ?1 ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([state.as_str()], Video::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// The most recently created videos, newest first.
pub fn list_recent_videos(conn: &Connection, limit: i64) -> Result<Vec<Video>> {
    let q = format!("SELECT {COLS} FROM videos ORDER BY created_at DESC LIMIT ?1");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([limit], Video::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Move an `unencoded` video into `encoding` with progress 0.
///
/// Returns `false` if the video is gone or in any other state, so a
/// finished video is never started again from a stale copy of its row.
pub fn mark_encoding(conn: &Connection, id: VideoId) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE videos SET state='encoding', progress=0, error=NULL, started_at=?2,
                completed_at=NULL
             WHERE id = ?1 AND state = 'unencoded'",
            rusqlite::params![id.to_string(), &now],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Overwrite the progress field (clamped to 0..=100).
pub fn update_progress(conn: &Connection, id: VideoId, progress: u8) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE videos SET progress = ?2 WHERE id = ?1",
            rusqlite::params![id.to_string(), i64::from(progress.min(100))],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Mark a video `complete` with progress 100.
pub fn complete_video(conn: &Connection, id: VideoId) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE videos SET state='complete', progress=100, error=NULL, completed_at=?2
             WHERE id = ?1",
            rusqlite::params![id.to_string(), &now],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Mark a video `error`, keeping its last progress value.
pub fn fail_video(conn: &Connection, id: VideoId, error: &str) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = conn
        .execute(
            "UPDATE videos SET state='error', error=?2, completed_at=?3 WHERE id = ?1",
            rusqlite::params![id.to_string(), error, &now],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Reset every `encoding` video back to `unencoded` with progress 0.
///
/// Only valid at startup, before any run is live in this process.
/// Returns the number of videos reset.
pub fn reset_encoding_videos(conn: &Connection) -> Result<usize> {
    conn.execute(
        "UPDATE videos SET state='unencoded', progress=0, started_at=NULL
         WHERE state='encoding'",
        [],
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Put a finished (`complete` or `error`) video back in the queue.
///
/// Returns `false` if the video does not exist or is not finished.
pub fn requeue_video(conn: &Connection, id: VideoId) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE videos SET state='unencoded', progress=0, error=NULL,
                started_at=NULL, completed_at=NULL
             WHERE id = ?1 AND state IN ('complete', 'error')",
            [id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

pub fn delete_video(conn: &Connection, id: VideoId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM videos WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
