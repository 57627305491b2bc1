//! Encoding errors.

use thiserror::Error;

/// Failures when moving between layers, catalog indices and board indices.
///
/// These indicate a radix mismatch or a corrupted index. The reverse move
/// generator treats an unrepresentable candidate as a skip, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("layer {0:#07x} is not in the active catalog")]
    NotInCatalog(u32),

    #[error("layer index {index} out of range for a catalog of {len} states")]
    LayerIndexOutOfRange { index: u64, len: usize },

    #[error("board index {index} out of range for radix {radix}")]
    BoardIndexOutOfRange { index: u64, radix: u64 },

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),
}
