//! Error types shared by every fstools component.
//!
//! Errors are categorized by the layer that produced them:
//! - `Storage`: probing, reading or preparing a volume
//! - `Mount`: mount, move and pivot operations
//! - `NotFound` / `InvalidState`: the device is not in the expected shape
//! - `Config` / `InvalidArgument`: caller-fixable input problems

use std::io;
use thiserror::Error;

/// Result alias used across fstools crates.
pub type FstoolsResult<T> = Result<T, FstoolsError>;

/// Errors that can occur while deciding on or setting up the root overlay.
#[derive(Debug, Error)]
pub enum FstoolsError {
    /// Volume probing, reading or preparation failed.
    #[error("storage: {0}")]
    Storage(String),

    /// A mount, move or pivot syscall failed.
    #[error("mount: {0}")]
    Mount(String),

    /// A required volume, device or helper does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be built.
    #[error("config: {0}")]
    Config(String),

    /// Caller passed something the tool does not understand.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The system is not in a state where the operation is safe.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// External helper or unexpected internal failure.
    #[error("internal: {0}")]
    Internal(String),

    /// Generic IO error (catch-all).
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl From<String> for FstoolsError {
    fn from(msg: String) -> Self {
        FstoolsError::Internal(msg)
    }
}

impl From<&str> for FstoolsError {
    fn from(msg: &str) -> Self {
        FstoolsError::Internal(msg.to_string())
    }
}
