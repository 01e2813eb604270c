//! Embedded SQL migrations and runner.
//!
//! Migrations are `&str` constants applied in order; a `schema_migrations`
//! table records which versions have run.

use em_core::{Error, Result};
use rusqlite::Connection;

/// V1: encoders, their ordered tasks, and videos.
const V1_INITIAL: &str = r#"
CREATE TABLE encoders (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE encoding_tasks (
    id                 TEXT PRIMARY KEY,
    encoder_id         TEXT NOT NULL REFERENCES encoders(id) ON DELETE CASCADE,
    position           INTEGER NOT NULL,
    name               TEXT NOT NULL DEFAULT '',
    output_file_suffix TEXT NOT NULL,
    command            TEXT NOT NULL DEFAULT '',
    created_at         TEXT NOT NULL,
    UNIQUE (encoder_id, position)
);

CREATE TABLE videos (
    id           TEXT PRIMARY KEY,
    file         TEXT NOT NULL,
    encoder_id   TEXT NOT NULL REFERENCES encoders(id),
    state        TEXT NOT NULL DEFAULT 'unencoded',
    progress     INTEGER NOT NULL DEFAULT 0,
    error        TEXT,
    created_at   TEXT NOT NULL,
    started_at   TEXT,
    completed_at TEXT
);

CREATE INDEX idx_videos_state ON videos(state);
CREATE INDEX idx_videos_created ON videos(created_at);
CREATE INDEX idx_tasks_encoder ON encoding_tasks(encoder_id, position);
"#;

/// V2: optional completion callback per video.
const V2_CALLBACK_URL: &str = r#"
ALTER TABLE videos ADD COLUMN callback_url TEXT;
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL), (2, V2_CALLBACK_URL)];

/// Apply every migration that has not run yet.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}
