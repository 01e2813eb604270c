//! Unified error type for enigmamachine.
//!
//! Failures from every crate end up in [`Error`]. Encoding failures carry the
//! diagnostic text that is stored on the video record, and API handlers derive
//! an HTTP status via [`Error::http_status`].

use std::fmt;
use std::path::Path;

/// Unified error type covering all failure modes in enigmamachine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "video", "encoder").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// An external tool could not be located or run.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        tool: String,
        message: String,
    },

    /// A transcode step ran but did not produce a usable output.
    #[error("Execution failed: {message}")]
    ExecutionFailed { message: String },

    /// The input file for a transcode step does not exist.
    #[error("Missing input: {path}")]
    MissingInput { path: String },

    /// The operation was cancelled before it finished.
    #[error("Cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Tool { .. } => 502,
            Error::ExecutionFailed { .. } => 500,
            Error::MissingInput { .. } => 500,
            Error::Cancelled => 409,
            Error::Internal(_) => 500,
        }
    }

    /// Whether this error means a transcode step failed.
    ///
    /// A missing input is reported the same way as a failed execution.
    pub fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Error::ExecutionFailed { .. } | Error::MissingInput { .. } | Error::Tool { .. }
        )
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ExecutionFailed`].
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Error::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::MissingInput`].
    pub fn missing_input(path: &Path) -> Self {
        Error::MissingInput {
            path: path.display().to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
