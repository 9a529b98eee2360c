//! Error types shared across the crate

use crate::raw::DecodeError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RawPickError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Scan error: {0}")]
    ScanError(String),

    #[error("File operation failed: {0}")]
    FileOperation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, RawPickError>;
