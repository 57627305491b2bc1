//! Placement-only Gobblet Gobblers state space with layer-based board indexing.
//!
//! # Layer Encoding
//!
//! A board is three independent *layers*, one per piece size. A layer records,
//! for each of the 9 cells, which player owns the piece of that size there:
//!
//! ```text
//! Layer (u32, 18 bits used): 2 bits per cell, cell i at bits 2i..2i+1
//!   0 = empty, 1 = P1, 2 = P2
//!
//! Cell indices (row-major order):
//!   (0,0)=0  (0,1)=1  (0,2)=2
//!   (1,0)=3  (1,1)=4  (1,2)=5
//!   (2,0)=6  (2,1)=7  (2,2)=8
//! ```
//!
//! # Board Index
//!
//! Every layer with at most two pieces per player appears in the [`Catalog`]
//! with a dense index (1423 layers for the full game). A board packs its three
//! layer indices in mixed radix, largest size first:
//!
//! ```text
//! index = (large * R + medium) * R + small     where R = catalog.len()
//! ```
//!
//! The canonical index of a board is the smallest index among its images under
//! the 8 symmetries of the square.
//!
//! Only cover moves exist in this model: placing an unused piece on a cell that
//! is empty or shows a strictly smaller piece. Pieces never leave the board.

pub mod board;
pub mod catalog;
pub mod codec;
pub mod error;
pub mod movegen;
pub mod reverse;
pub mod symmetry;

use serde::{Deserialize, Serialize};

pub use board::{visibility_masks, winner_from_masks, Board, TopView, WIN_LINES, WIN_MASKS};
pub use catalog::{Catalog, Layer, FULL_CATALOG_LEN, PIECES_PER_SIZE};
pub use codec::{pack, unpack, BoardIndex, CanonicalIndex, Radix};
pub use error::CoreError;
pub use movegen::{cover_moves, distinct_successors, outdegree, CoverMoves};
pub use reverse::{predecessors, unmoves};
pub use symmetry::{canonical_board, canonicalize, Symmetries};

/// Player identifier.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Player {
    One = 1,
    Two = 2,
}

impl Player {
    /// Both players, P1 first.
    pub const BOTH: [Player; 2] = [Player::One, Player::Two];

    /// Get the opponent player.
    #[inline]
    pub fn opponent(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// Convert from the 2-bit cell code (1 or 2) to Player.
    #[inline]
    pub fn from_bits(bits: u8) -> Option<Player> {
        match bits {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }
}

/// Piece size.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Size {
    Small = 0,
    Medium = 1,
    Large = 2,
}

impl Size {
    /// Sizes in packing and generation order.
    pub const LARGEST_FIRST: [Size; 3] = [Size::Large, Size::Medium, Size::Small];

    /// Check if this size can gobble (cover) another size.
    #[inline]
    pub fn can_gobble(self, other: Size) -> bool {
        (self as u8) > (other as u8)
    }

    /// Convert from index (0, 1, 2) to Size.
    #[inline]
    pub fn from_index(idx: usize) -> Option<Size> {
        match idx {
            0 => Some(Size::Small),
            1 => Some(Size::Medium),
            2 => Some(Size::Large),
            _ => None,
        }
    }

    /// One-letter label used when printing boards.
    pub fn letter(self) -> char {
        match self {
            Size::Small => 'S',
            Size::Medium => 'M',
            Size::Large => 'L',
        }
    }
}

/// Position on the 3x3 board (0-8).
///
/// Layout:
/// ```text
///   0 1 2
///   3 4 5
///   6 7 8
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct Pos(pub u8);

impl Pos {
    /// Create a position from row and column (0-2 each).
    #[inline]
    pub fn from_row_col(row: u8, col: u8) -> Pos {
        debug_assert!(row < 3 && col < 3);
        Pos(row * 3 + col)
    }

    /// Get the row (0-2).
    #[inline]
    pub fn row(self) -> u8 {
        self.0 / 3
    }

    /// Get the column (0-2).
    #[inline]
    pub fn col(self) -> u8 {
        self.0 % 3
    }

    /// Iterate over all 9 positions.
    pub fn all() -> impl Iterator<Item = Pos> {
        (0..9).map(Pos)
    }
}
