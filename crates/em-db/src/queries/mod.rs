//! Database query modules.

pub mod encoders;
pub mod encoding_tasks;
pub mod videos;

/// Whether a rusqlite error is a constraint violation (unique, foreign key).
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
