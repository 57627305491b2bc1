//! Solver error type.

use std::io;

use cover_core::CoreError;
use thiserror::Error;

/// Errors from the scan, moves and solve stages.
///
/// There are no retries. A failed stage leaves the store at its last commit
/// and is resumed by running it again.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(
        "store was built for radix {stored_radix} (fingerprint {stored_fingerprint:#018x}), \
         active catalog has radix {radix} (fingerprint {fingerprint:#018x})"
    )]
    CatalogMismatch {
        stored_radix: u64,
        stored_fingerprint: u64,
        radix: u64,
        fingerprint: u64,
    },

    #[error("corrupt store: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;
