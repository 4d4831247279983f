//! Error type definitions for the streamcast supervisor
//!
//! This module defines the error hierarchy used throughout the application.
//! The web layer maps these onto HTTP status codes; everything below the web
//! layer works in terms of `AppError` or the more specific
//! [`TranscoderError`].

pub mod types;

pub use types::{AppError, TranscoderError};

/// Convenience alias used by services and repositories
pub type AppResult<T> = Result<T, AppError>;
