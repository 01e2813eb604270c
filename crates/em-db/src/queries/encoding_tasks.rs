//! Encoding task operations.
//!
//! Tasks are append-only within an encoder: new tasks go to the end of the
//! chain and reordering is not supported.

use chrono::Utc;
use em_core::{EncoderId, EncodingTaskId, Error, Result};
use rusqlite::Connection;

use crate::models::EncodingTask;

const COLS: &str = "id, encoder_id, position, name, output_file_suffix, command, created_at";

/// Append a task to the end of an encoder's chain.
pub fn append_task(
    conn: &Connection,
    encoder_id: EncoderId,
    name: &str,
    output_file_suffix: &str,
    command: &str,
) -> Result<EncodingTask> {
    if output_file_suffix.trim().is_empty() {
        return Err(Error::Validation("output_file_suffix is required".into()));
    }
    if super::encoders::get_encoder(conn, encoder_id)?.is_none() {
        return Err(Error::not_found("encoder", encoder_id));
    }

    let id = EncodingTaskId::new();
    let now = Utc::now().to_rfc3339();

    let q = format!(
        "INSERT INTO encoding_tasks (id, encoder_id, position, name, output_file_suffix, command, created_at)
         SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1, ?3, ?4, ?5, ?6
         FROM encoding_tasks WHERE encoder_id = ?2
         RETURNING {COLS}"
    );

    conn.query_row(
        &q,
        rusqlite::params![
            id.to_string(),
            encoder_id.to_string(),
            name.trim(),
            output_file_suffix.trim(),
            command.trim(),
            &now
        ],
        EncodingTask::from_row,
    )
    .map_err(|e| Error::database(e.to_string()))
}

pub fn get_task(conn: &Connection, id: EncodingTaskId) -> Result<Option<EncodingTask>> {
    let q = format!("SELECT {COLS} FROM encoding_tasks WHERE id = ?1");
    match conn.query_row(&q, [id.to_string()], EncodingTask::from_row) {
        Ok(t) => Ok(Some(t)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// All tasks of an encoder in chain order.
pub fn list_tasks_for_encoder(conn: &Connection, encoder_id: EncoderId) -> Result<Vec<EncodingTask>> {
    let q = format!(
        "SELECT {COLS} FROM encoding_tasks WHERE encoder_id = ?1 ORDER BY position ASC"
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([encoder_id.to_string()], EncodingTask::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Delete a task. Remaining tasks keep their positions.
pub fn delete_task(conn: &Connection, id: EncodingTaskId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM encoding_tasks WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
