//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for the column order used by its query
//! module's `COLS` constant.

use std::path::PathBuf;

use em_core::{EncoderId, EncodingTaskId, VideoId, VideoState};
use rusqlite::types::Type;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))?;
    Ok(T::from(uuid))
}

fn parse_state(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<VideoState> {
    let s: String = row.get(idx)?;
    s.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Encoder {
    pub id: EncoderId,
    pub name: String,
    pub created_at: String,
}

impl Encoder {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }
}

// ---------------------------------------------------------------------------
// EncodingTask
// ---------------------------------------------------------------------------

/// One step of an encoder's chain.
#[derive(Debug, Clone)]
pub struct EncodingTask {
    pub id: EncodingTaskId,
    pub encoder_id: EncoderId,
    /// 1-based position within the encoder's chain.
    pub position: i64,
    pub name: String,
    pub output_file_suffix: String,
    /// ffmpeg arguments, optionally containing `{input}` / `{output}`.
    pub command: String,
    pub created_at: String,
}

impl EncodingTask {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            encoder_id: parse_id(row, 1)?,
            position: row.get(2)?,
            name: row.get(3)?,
            output_file_suffix: row.get(4)?,
            command: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Video {
    pub id: VideoId,
    pub file: String,
    pub encoder_id: EncoderId,
    pub state: VideoState,
    pub progress: u8,
    pub error: Option<String>,
    pub callback_url: Option<String>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

impl Video {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let progress: i64 = row.get(4)?;
        Ok(Self {
            id: parse_id(row, 0)?,
            file: row.get(1)?,
            encoder_id: parse_id(row, 2)?,
            state: parse_state(row, 3)?,
            progress: progress.clamp(0, 100) as u8,
            error: row.get(5)?,
            callback_url: row.get(6)?,
            created_at: row.get(7)?,
            started_at: row.get(8)?,
            completed_at: row.get(9)?,
        })
    }

    pub fn file_path(&self) -> PathBuf {
        PathBuf::from(&self.file)
    }
}
