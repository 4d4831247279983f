use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

/// Top-level application error type
///
/// Uses `thiserror` for automatic error trait implementations and proper
/// error chaining. The web layer decides which HTTP status each variant
/// maps to; nothing below the web layer knows about status codes.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors (sqlx)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transcoder supervisor errors
    #[error(transparent)]
    Transcoder(#[from] TranscoderError),

    /// Validation errors (bad input, malformed ids, empty fields)
    #[error("{message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// State conflicts (updating a running channel, settings while running)
    #[error("{message}")]
    Conflict { message: String },

    /// Authentication failures (missing/invalid/expired credentials)
    #[error("{message}")]
    Unauthorized { message: String },

    /// Role too low for the requested operation
    #[error("insufficient permissions")]
    Forbidden,

    /// JSON serialization failures (logo/output config, settings documents)
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic internal errors
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found<S: Into<String>>(resource: &'static str, id: S) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn unauthorized<S: Into<String>>(message: S) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Process lifecycle specific errors
#[derive(Error, Debug)]
pub enum TranscoderError {
    /// A LiveProcess already exists for this channel
    #[error("channel {0} is already running")]
    AlreadyRunning(Uuid),

    /// No LiveProcess exists for this channel
    #[error("channel {0} is not running")]
    NotRunning(Uuid),

    /// The configured logo overlay file does not exist at spawn time
    #[error("logo file not found: {}", .0.display())]
    LogoNotFound(PathBuf),

    /// The encoder binary could not be spawned
    #[error("failed to spawn encoder: {0}")]
    Spawn(#[from] std::io::Error),

    /// The output directory could not be prepared
    #[error("failed to prepare output directory {dir}: {message}")]
    OutputDir { dir: String, message: String },
}
