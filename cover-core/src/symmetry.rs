//! D4 symmetry reduction.
//!
//! The 8 symmetries of the square are generated from a quarter turn and a
//! left-right mirror. Each is stored as a cell mapping `new_pos -> old_pos`.
//!
//! Board layout:
//! ```text
//!   0 1 2
//!   3 4 5
//!   6 7 8
//! ```

use crate::board::Board;
use crate::catalog::Catalog;
use crate::codec::{pack, unpack, BoardIndex, CanonicalIndex};
use crate::error::CoreError;

/// The distinct cell permutations of the square, identity first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symmetries {
    mappings: Vec<[u8; 9]>,
}

#[inline]
fn rotate_once(p: u8) -> u8 {
    let (r, c) = (p / 3, p % 3);
    c * 3 + (2 - r)
}

#[inline]
fn mirror(p: u8) -> u8 {
    let (r, c) = (p / 3, p % 3);
    r * 3 + (2 - c)
}

impl Symmetries {
    /// Identity, three rotations, and each of those mirrored. Duplicates are
    /// dropped, which leaves exactly 8.
    pub fn new() -> Symmetries {
        let identity: [u8; 9] = [0, 1, 2, 3, 4, 5, 6, 7, 8];
        let mut rotations = vec![identity];
        for _ in 0..3 {
            let prev = rotations[rotations.len() - 1];
            rotations.push(prev.map(rotate_once));
        }

        let mut mappings: Vec<[u8; 9]> = Vec::with_capacity(8);
        for rotation in rotations {
            for candidate in [rotation, rotation.map(mirror)] {
                if !mappings.contains(&candidate) {
                    mappings.push(candidate);
                }
            }
        }
        Symmetries { mappings }
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn get(&self, t: usize) -> Option<&[u8; 9]> {
        self.mappings.get(t)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8; 9]> {
        self.mappings.iter()
    }
}

impl Default for Symmetries {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical form of a board index: the minimum over its symmetric images.
///
/// Images whose layers fall outside a truncated catalog are skipped; the
/// identity image always qualifies. With an untruncated catalog all 8 images
/// take part.
pub fn canonicalize(catalog: &Catalog, index: BoardIndex) -> Result<CanonicalIndex, CoreError> {
    let radix = catalog.radix();
    if index >= radix.space() {
        return Err(CoreError::BoardIndexOutOfRange {
            index,
            radix: radix.get(),
        });
    }
    let (large, medium, small) = unpack(index, radix);

    let mut best = index;
    for t in 1..catalog.symmetries().len() {
        let image = (
            catalog.image(large, t),
            catalog.image(medium, t),
            catalog.image(small, t),
        );
        if let (Some(l), Some(m), Some(s)) = image {
            let candidate = pack(l, m, s, radix);
            if candidate < best {
                best = candidate;
            }
        }
    }
    Ok(best)
}

/// Canonical index of a board given by layers.
pub fn canonical_board(catalog: &Catalog, board: &Board) -> Result<CanonicalIndex, CoreError> {
    canonicalize(catalog, board.encode(catalog)?)
}

/// Every representable symmetric image of `board`, one per symmetry
/// (duplicates kept when the board is itself symmetric).
pub fn images(catalog: &Catalog, board: &Board) -> Vec<BoardIndex> {
    catalog
        .symmetries()
        .iter()
        .filter_map(|mapping| board.transform(mapping).try_encode(catalog))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Player, Pos, Size};

    /// The same table written out by hand (new_pos -> old_pos).
    const D4: [[u8; 9]; 8] = [
        [0, 1, 2, 3, 4, 5, 6, 7, 8], // Identity
        [6, 3, 0, 7, 4, 1, 8, 5, 2], // Rotate 90° clockwise
        [8, 7, 6, 5, 4, 3, 2, 1, 0], // Rotate 180°
        [2, 5, 8, 1, 4, 7, 0, 3, 6], // Rotate 270° clockwise
        [2, 1, 0, 5, 4, 3, 8, 7, 6], // Reflect horizontal (flip left-right)
        [6, 7, 8, 3, 4, 5, 0, 1, 2], // Reflect vertical (flip top-bottom)
        [0, 3, 6, 1, 4, 7, 2, 5, 8], // Reflect main diagonal
        [8, 5, 2, 7, 4, 1, 6, 3, 0], // Reflect anti-diagonal
    ];

    #[test]
    fn test_exactly_eight_symmetries() {
        let syms = Symmetries::new();
        assert_eq!(syms.len(), 8);
        assert_eq!(syms.get(0), Some(&D4[0]));
        for mapping in &D4 {
            assert!(syms.iter().any(|m| m == mapping), "missing {:?}", mapping);
        }
    }

    #[test]
    fn test_each_mapping_is_permutation() {
        for mapping in Symmetries::new().iter() {
            let mut sorted = *mapping;
            sorted.sort_unstable();
            assert_eq!(sorted, [0, 1, 2, 3, 4, 5, 6, 7, 8]);
            // Center is fixed by every symmetry of the square.
            assert_eq!(mapping[4], 4);
        }
    }

    #[test]
    fn test_corners_share_canonical() {
        let catalog = Catalog::full();
        let mut canonicals = Vec::new();
        for corner in [0, 2, 6, 8] {
            let mut board = Board::new();
            board.push_piece(Pos(corner), Player::One, Size::Small);
            canonicals.push(canonical_board(&catalog, &board).unwrap());
        }
        assert!(canonicals.iter().all(|&c| c == canonicals[0]));

        let mut edge = Board::new();
        edge.push_piece(Pos(1), Player::One, Size::Small);
        assert_ne!(canonical_board(&catalog, &edge).unwrap(), canonicals[0]);
    }

    #[test]
    fn test_empty_board_is_canonical_zero() {
        let catalog = Catalog::full();
        assert_eq!(canonicalize(&catalog, 0), Ok(0));
    }

    #[test]
    fn test_canonicalize_out_of_range() {
        let catalog = Catalog::build(2, Some(50)).unwrap();
        assert_eq!(
            canonicalize(&catalog, 125_000),
            Err(CoreError::BoardIndexOutOfRange { index: 125_000, radix: 50 })
        );
    }

    #[test]
    fn test_images_of_asymmetric_board() {
        let catalog = Catalog::full();
        let mut board = Board::new();
        board.push_piece(Pos(0), Player::One, Size::Large);
        board.push_piece(Pos(1), Player::Two, Size::Small);
        let all = images(&catalog, &board);
        assert_eq!(all.len(), 8);
        let mut distinct = all.clone();
        distinct.sort_unstable();
        distinct.dedup();
        assert_eq!(distinct.len(), 8);
        let canonical = canonical_board(&catalog, &board).unwrap();
        assert_eq!(Some(&canonical), distinct.first());
    }

    #[test]
    fn test_truncated_catalog_skips_missing_images() {
        // In the 50-layer catalog the P1 singles only cover cells 0..=3.
        let catalog = Catalog::build(2, Some(50)).unwrap();
        let mut board = Board::new();
        board.push_piece(Pos(3), Player::One, Size::Large);
        let index = board.encode(&catalog).unwrap();
        let canonical = canonicalize(&catalog, index).unwrap();
        // Cell 3 maps to cells 1, 3, 5, 7; only 1 and 3 are representable.
        let mut expected = Board::new();
        expected.push_piece(Pos(1), Player::One, Size::Large);
        assert_eq!(canonical, expected.encode(&catalog).unwrap());
    }
}
