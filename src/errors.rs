//! Error types for the amognotes application.
//!
//! This module defines custom error types that categorize the failures
//! that can occur while managing notes, settings and background maintenance.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for the amognotes application.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// Invalid document or record format.
    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    /// User supplied value rejected (category names, colors, selectors).
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// Errors raised by the maintenance scheduler.
    #[error("Scheduler failed: {message}")]
    SchedulerFailed { message: String },

    #[error("{message}")]
    EditorError { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}

impl NotesError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        NotesError::ValidationFailed {
            message: message.into(),
        }
    }
}
