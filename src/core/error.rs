//! Domain-specific error types and error handling utilities.
//!
//! This module defines [`SyncError`] which covers every failure the sync layer can
//! surface. It uses `thiserror` for ergonomic error definitions and includes
//! constructor helpers for the common gateway failures.
//!
//! # Public API
//! - [`SyncError`]: Main error enum covering all failure modes
//! - [`Result<T>`]: Type alias for `std::result::Result<T, SyncError>`
//!
//! # Error Categories
//! - **Gateway failures**: network, validation and not-found responses. These are
//!   recoverable and are always reported to the caller, never retried.
//! - **Protocol misuse**: settling a mutation twice
//! - **Local I/O**: config files, the JSON-backed gateway document

use std::path::PathBuf;
use thiserror::Error;

/// Domain-specific error types for recipe-sync
#[derive(Error, Debug)]
pub enum SyncError {
    // Gateway errors
    #[error("Network failure: {message}")]
    Network { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Recipe not found: {id}")]
    NotFound { id: String },

    // Protocol errors
    #[error("Mutation {id} has already been settled")]
    MutationSettled { id: u64 },

    #[error("Invalid patch assignment: '{input}'. Use format like: name=Soto")]
    InvalidPatch { input: String },

    // Local errors
    #[error("Could not find config directory")]
    ConfigDirectoryNotFound,

    #[error("Failed to read data file '{path}': {source}")]
    DataReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse data file '{path}': {source}")]
    DataParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Create a network failure error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create an invalid patch error
    pub fn invalid_patch(input: impl Into<String>) -> Self {
        Self::InvalidPatch {
            input: input.into(),
        }
    }

    /// Create a data read failed error
    pub fn data_read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DataReadFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a data parse failed error
    pub fn data_parse_failed(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::DataParseFailed {
            path: path.into(),
            source,
        }
    }

    /// True for the gateway failures a caller may retry or surface to the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Validation { .. } | Self::NotFound { .. }
        )
    }
}
