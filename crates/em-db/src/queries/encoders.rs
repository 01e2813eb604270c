//! Encoder (profile) CRUD operations.

use chrono::Utc;
use em_core::{EncoderId, Error, Result};
use rusqlite::Connection;

use super::is_constraint_violation;
use crate::models::Encoder;

const COLS: &str = "id, name, created_at";

/// Longest accepted encoder name, in characters.
pub const MAX_NAME_LEN: usize = 254;

fn validate_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::Validation("encoder name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::Validation(format!(
            "encoder name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

/// Create a new encoder. Names are unique.
pub fn create_encoder(conn: &Connection, name: &str) -> Result<Encoder> {
    let name = validate_name(name)?;
    let id = EncoderId::new();
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO encoders (id, name, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![id.to_string(), name, &now],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            Error::Conflict(format!("an encoder named '{name}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Encoder {
        id,
        name: name.to_string(),
        created_at: now,
    })
}

pub fn get_encoder(conn: &Connection, id: EncoderId) -> Result<Option<Encoder>> {
    let q = format!("SELECT {COLS} FROM encoders WHERE id = ?1");
    match conn.query_row(&q, [id.to_string()], Encoder::from_row) {
        Ok(e) => Ok(Some(e)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

pub fn get_encoder_by_name(conn: &Connection, name: &str) -> Result<Option<Encoder>> {
    let q = format!("SELECT {COLS} FROM encoders WHERE name = ?1");
    match conn.query_row(&q, [name.trim()], Encoder::from_row) {
        Ok(e) => Ok(Some(e)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all encoders ordered by name.
pub fn list_encoders(conn: &Connection) -> Result<Vec<Encoder>> {
    let q = format!("SELECT {COLS} FROM encoders ORDER BY name ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Encoder::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Delete an encoder and its tasks.
///
/// Fails with `Conflict` while any video still references the encoder.
pub fn delete_encoder(conn: &Connection, id: EncoderId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM encoders WHERE id = ?1", [id.to_string()])
        .map_err(|e| {
            if is_constraint_violation(&e) {
                Error::Conflict("encoder is still referenced by videos".into())
            } else {
                Error::database(e.to_string())
            }
        })?;
    Ok(n > 0)
}
