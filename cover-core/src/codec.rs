//! Mixed-radix packing of three layer indices into one board index.

use std::fmt;
use std::num::NonZeroU64;

/// A packed board: `(large * R + medium) * R + small`.
///
/// The radix is not part of the value. Decoding with a different radix than
/// the one used to pack silently yields a different board.
pub type BoardIndex = u64;

/// The smallest [`BoardIndex`] among the symmetric images of a board.
pub type CanonicalIndex = u64;

/// Radix of the board codec (the catalog size). Always positive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Radix(NonZeroU64);

impl Radix {
    /// Returns `None` for a zero radix.
    pub fn new(radix: u64) -> Option<Radix> {
        NonZeroU64::new(radix).map(Radix)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// Number of board indices, `R^3`.
    #[inline]
    pub fn space(self) -> u64 {
        let r = self.get();
        r * r * r
    }
}

impl fmt::Display for Radix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pack three layer indices. Components are not range-checked.
#[inline]
pub fn pack(large: usize, medium: usize, small: usize, radix: Radix) -> BoardIndex {
    let r = radix.get();
    (large as u64 * r + medium as u64) * r + small as u64
}

/// Unpack a board index into `(large, medium, small)` layer indices.
#[inline]
pub fn unpack(index: BoardIndex, radix: Radix) -> (usize, usize, usize) {
    let r = radix.get();
    let small = index % r;
    let rest = index / r;
    let medium = rest % r;
    let large = rest / r;
    (large as usize, medium as usize, small as usize)
}
