use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store is closed and cannot serve the request.
    #[error("store is closed: '{path}'")]
    Closed { path: PathBuf },

    /// `open` was called on a store that is already open.
    #[error("store is already open: '{path}'")]
    AlreadyOpen { path: PathBuf },

    /// The operation requires the store to be closed.
    #[error("store is still open: '{path}'")]
    StillOpen { path: PathBuf },

    /// The backing file could not be decoded.
    #[error("store file is malformed: '{path}': {detail}")]
    Corrupt { path: PathBuf, detail: String },
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
