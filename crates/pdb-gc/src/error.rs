use pdb_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the collector.
///
/// Routine conditions (a second `begin`, stepping while idle) are not errors.
/// A storage failure abandons the cycle in progress; the driver may start a
/// new one with [`Collector::begin`](crate::Collector::begin).
#[derive(Error, Debug)]
pub enum GcError {
    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The collector configuration is unusable.
    #[error("invalid collector configuration: {detail}")]
    InvalidConfig {
        /// What is wrong with it.
        detail: String,
    },
}

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, GcError>;
