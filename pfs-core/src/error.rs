// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for Portable FS

use thiserror::Error;

/// Result type alias
pub type PfsResult<T> = Result<T, PfsError>;

/// Main error type
///
/// Every public operation either succeeds or fails with one of these; a
/// missing entry and an unsupported storage category are always distinct.
#[derive(Error, Debug)]
pub enum PfsError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Illegal operation: {0}")]
    IllegalOperation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(std::io::Error),
}

impl PfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PfsError::NotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PfsError::Cancelled)
    }

    /// Map an I/O error raised while touching `path` onto the taxonomy.
    pub fn from_io(err: std::io::Error, path: impl std::fmt::Display) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => PfsError::NotFound(path.to_string()),
            std::io::ErrorKind::AlreadyExists => PfsError::AlreadyExists(path.to_string()),
            _ => PfsError::Io(err),
        }
    }
}

impl From<std::io::Error> for PfsError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => PfsError::NotFound(err.to_string()),
            std::io::ErrorKind::AlreadyExists => PfsError::AlreadyExists(err.to_string()),
            _ => PfsError::Io(err),
        }
    }
}
