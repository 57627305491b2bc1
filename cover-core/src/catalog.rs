//! Layer-state catalog.
//!
//! Enumerates every single-size layer with at most `max_per_player` pieces for
//! each player and assigns it a dense index. The catalog is built once and
//! passed by reference everywhere a board index is encoded or decoded; it also
//! carries the symmetry table so one handle is enough for canonicalization.

use itertools::Itertools;
use xxhash_rust::xxh64::xxh64;

use crate::codec::Radix;
use crate::error::CoreError;
use crate::symmetry::Symmetries;
use crate::{Player, Pos};

/// Pieces of each size a player owns.
pub const PIECES_PER_SIZE: u8 = 2;

/// Catalog size for `PIECES_PER_SIZE` with no truncation.
pub const FULL_CATALOG_LEN: usize = 1423;

/// Sentinel in the lookup tables for "not in catalog".
const ABSENT: u16 = u16::MAX;
const CELLS: u8 = 9;

/// Ownership of one piece size across the 9 cells.
///
/// 2 bits per cell: 0 = empty, 1 = P1, 2 = P2. Cell i at bits 2i..2i+1.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, PartialOrd, Ord)]
pub struct Layer(pub u32);

impl Layer {
    const CELL_BITS: u32 = 2;
    const CELL_MASK: u32 = 0b11;

    /// Number of raw 18-bit encodings.
    pub const ENCODINGS: usize = 1 << 18;

    pub const EMPTY: Layer = Layer(0);

    /// Build from per-cell codes (0, 1 or 2).
    pub fn from_cells(cells: [u8; 9]) -> Layer {
        let mut bits = 0u32;
        for (i, &code) in cells.iter().enumerate() {
            debug_assert!(code <= 2);
            bits |= (code as u32 & Self::CELL_MASK) << (i as u32 * Self::CELL_BITS);
        }
        Layer(bits)
    }

    /// Per-cell codes (0, 1 or 2).
    pub fn cells(self) -> [u8; 9] {
        let mut cells = [0u8; 9];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = ((self.0 >> (i as u32 * Self::CELL_BITS)) & Self::CELL_MASK) as u8;
        }
        cells
    }

    /// Owner of this size at `pos`.
    #[inline]
    pub fn get(self, pos: Pos) -> Option<Player> {
        Player::from_bits(((self.0 >> (pos.0 as u32 * Self::CELL_BITS)) & Self::CELL_MASK) as u8)
    }

    /// Copy of this layer with `pos` set to `owner`.
    #[inline]
    pub fn with(self, pos: Pos, owner: Option<Player>) -> Layer {
        let shift = pos.0 as u32 * Self::CELL_BITS;
        let code = owner.map_or(0, |p| p as u32);
        Layer((self.0 & !(Self::CELL_MASK << shift)) | (code << shift))
    }

    /// Number of cells owned by `player`.
    pub fn count(self, player: Player) -> u8 {
        Pos::all().filter(|&pos| self.get(pos) == Some(player)).count() as u8
    }

    /// Occupancy bitmasks `(p1, p2)`, bit i for cell i.
    pub fn masks(self) -> (u16, u16) {
        let mut p1 = 0u16;
        let mut p2 = 0u16;
        for pos in Pos::all() {
            match self.get(pos) {
                Some(Player::One) => p1 |= 1 << pos.0,
                Some(Player::Two) => p2 |= 1 << pos.0,
                None => {}
            }
        }
        (p1, p2)
    }

    /// Apply a cell permutation: `new[i] = old[mapping[i]]`.
    pub fn permute(self, mapping: &[u8; 9]) -> Layer {
        let mut bits = 0u32;
        for (new_pos, &old_pos) in mapping.iter().enumerate() {
            let code = (self.0 >> (old_pos as u32 * Self::CELL_BITS)) & Self::CELL_MASK;
            bits |= code << (new_pos as u32 * Self::CELL_BITS);
        }
        Layer(bits)
    }
}

/// Dense index over valid layers, plus the precomputed symmetry images.
#[derive(Clone, Debug)]
pub struct Catalog {
    states: Vec<Layer>,
    /// Raw 18-bit layer encoding -> index, `ABSENT` if not in catalog.
    lookup: Vec<u16>,
    /// Index -> occupancy masks, for the scanner's bitboard win test.
    masks: Vec<(u16, u16)>,
    /// Index -> index of the layer under each symmetry, `ABSENT` if the image
    /// fell outside a truncated catalog.
    images: Vec<[u16; 8]>,
    symmetries: Symmetries,
    max_per_player: u8,
}

impl Catalog {
    /// The catalog for the real game: 2 pieces per size, 1423 layers.
    pub fn full() -> Catalog {
        Self::from_states(enumerate(PIECES_PER_SIZE), PIECES_PER_SIZE)
    }

    /// Build a catalog, optionally keeping only the first `limit` layers.
    ///
    /// A truncated catalog changes which boards are representable, so the
    /// same catalog must be used for every stage that shares a store.
    ///
    /// A layer has 9 cells, so any `max_per_player` of 9 or more is the same
    /// unrestricted catalog of 3^9 layers and is recorded as 9.
    pub fn build(max_per_player: u8, limit: Option<usize>) -> Result<Catalog, CoreError> {
        if max_per_player == 0 {
            return Err(CoreError::InvalidCatalog("max_per_player must be positive".into()));
        }
        let max_per_player = max_per_player.min(CELLS);
        let mut states = enumerate(max_per_player);
        if let Some(limit) = limit {
            if limit == 0 {
                return Err(CoreError::InvalidCatalog("catalog limit must be positive".into()));
            }
            states.truncate(limit);
        }
        Ok(Self::from_states(states, max_per_player))
    }

    fn from_states(states: Vec<Layer>, max_per_player: u8) -> Catalog {
        let mut lookup = vec![ABSENT; Layer::ENCODINGS];
        for (i, layer) in states.iter().enumerate() {
            lookup[layer.0 as usize] = i as u16;
        }

        let masks = states.iter().map(|layer| layer.masks()).collect();

        let symmetries = Symmetries::new();
        let images = states
            .iter()
            .map(|layer| {
                let mut row = [ABSENT; 8];
                for (t, mapping) in symmetries.iter().enumerate() {
                    row[t] = lookup[layer.permute(mapping).0 as usize];
                }
                row
            })
            .collect();

        Catalog {
            states,
            lookup,
            masks,
            images,
            symmetries,
            max_per_player,
        }
    }

    /// Number of layers; the codec radix.
    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    #[inline]
    pub fn radix(&self) -> Radix {
        // `from_states` always receives at least the empty layer.
        Radix::new(self.states.len() as u64).unwrap_or_else(|| unreachable!("empty catalog"))
    }

    /// Piece limit per size per player this catalog was built for.
    #[inline]
    pub fn max_per_player(&self) -> u8 {
        self.max_per_player
    }

    /// Whether this is an untruncated catalog, closed under all symmetries.
    pub fn is_closed(&self) -> bool {
        self.images.iter().all(|row| row.iter().all(|&i| i != ABSENT))
    }

    #[inline]
    pub fn index_of(&self, layer: Layer) -> Option<usize> {
        match self.lookup.get(layer.0 as usize) {
            Some(&i) if i != ABSENT => Some(i as usize),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, layer: Layer) -> bool {
        self.index_of(layer).is_some()
    }

    #[inline]
    pub fn state_of(&self, index: usize) -> Option<Layer> {
        self.states.get(index).copied()
    }

    /// Like [`Catalog::index_of`] but reports the failure.
    pub fn lookup(&self, layer: Layer) -> Result<usize, CoreError> {
        self.index_of(layer).ok_or(CoreError::NotInCatalog(layer.0))
    }

    /// Like [`Catalog::state_of`] but reports the failure.
    pub fn state(&self, index: usize) -> Result<Layer, CoreError> {
        self.state_of(index).ok_or(CoreError::LayerIndexOutOfRange {
            index: index as u64,
            len: self.states.len(),
        })
    }

    pub fn states(&self) -> &[Layer] {
        &self.states
    }

    /// Occupancy masks of layer `index`. Panics if out of range.
    #[inline]
    pub fn occupancy(&self, index: usize) -> (u16, u16) {
        self.masks[index]
    }

    /// Index of layer `index` under symmetry `t`, if representable.
    #[inline]
    pub fn image(&self, index: usize, t: usize) -> Option<usize> {
        match self.images[index][t] {
            ABSENT => None,
            i => Some(i as usize),
        }
    }

    pub fn symmetries(&self) -> &Symmetries {
        &self.symmetries
    }

    /// xxh64 over the piece limit and the ordered layers. Two catalogs with the
    /// same fingerprint produce identical board indices.
    pub fn fingerprint(&self) -> u64 {
        let mut bytes = Vec::with_capacity(1 + self.states.len() * 4);
        bytes.push(self.max_per_player);
        for layer in &self.states {
            bytes.extend_from_slice(&layer.0.to_le_bytes());
        }
        xxh64(&bytes, 0)
    }
}

/// All layers with at most `max` pieces per player, in generation order:
/// for k P1 pieces and l P2 pieces (k, l ascending), P1 cells in
/// lexicographic combination order, then P2 cells among the rest.
fn enumerate(max: u8) -> Vec<Layer> {
    let mut states = Vec::new();
    for k in 0..=max as usize {
        for l in 0..=max as usize {
            for p1_cells in (0u8..9).combinations(k) {
                let rest: Vec<u8> = (0u8..9).filter(|c| !p1_cells.contains(c)).collect();
                for p2_cells in rest.into_iter().combinations(l) {
                    let mut layer = Layer::EMPTY;
                    for &c in &p1_cells {
                        layer = layer.with(Pos(c), Some(Player::One));
                    }
                    for &c in &p2_cells {
                        layer = layer.with(Pos(c), Some(Player::Two));
                    }
                    states.push(layer);
                }
            }
        }
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_full_catalog_size() {
        let catalog = Catalog::full();
        assert_eq!(catalog.len(), FULL_CATALOG_LEN);
        assert_eq!(catalog.radix().get(), 1423);
        assert!(catalog.is_closed());
    }

    #[test]
    fn test_catalog_bijection() {
        let catalog = Catalog::full();
        let mut seen = HashSet::new();
        for i in 0..catalog.len() {
            let layer = catalog.state_of(i).unwrap();
            assert!(seen.insert(layer), "duplicate layer at {}", i);
            assert_eq!(catalog.index_of(layer), Some(i));
        }
        assert_eq!(catalog.state_of(catalog.len()), None);
    }

    #[test]
    fn test_generation_order() {
        let catalog = Catalog::full();
        // Empty first, then single P2 pieces, then P2 pairs, then single P1.
        assert_eq!(catalog.state_of(0), Some(Layer::EMPTY));
        assert_eq!(catalog.state_of(1), Some(Layer::EMPTY.with(Pos(0), Some(Player::Two))));
        assert_eq!(catalog.state_of(9), Some(Layer::EMPTY.with(Pos(8), Some(Player::Two))));
        let first_pair = Layer::EMPTY
            .with(Pos(0), Some(Player::Two))
            .with(Pos(1), Some(Player::Two));
        assert_eq!(catalog.state_of(10), Some(first_pair));
        assert_eq!(catalog.state_of(46), Some(Layer::EMPTY.with(Pos(0), Some(Player::One))));
    }

    #[test]
    fn test_unrestricted_catalog() {
        let all = Catalog::build(CELLS, None).unwrap();
        assert_eq!(all.len(), 19_683);
        assert!(all.len() < ABSENT as usize);
        assert!(all.is_closed());
        let full_board = Layer::from_cells([1, 2, 1, 2, 1, 2, 1, 2, 1]);
        assert_eq!(all.state_of(all.index_of(full_board).unwrap()), Some(full_board));

        let beyond = Catalog::build(200, None).unwrap();
        assert_eq!(beyond.max_per_player(), CELLS);
        assert_eq!(beyond.fingerprint(), all.fingerprint());
    }

    #[test]
    fn test_piece_limits_respected() {
        let catalog = Catalog::full();
        for &layer in catalog.states() {
            assert!(layer.count(Player::One) <= PIECES_PER_SIZE);
            assert!(layer.count(Player::Two) <= PIECES_PER_SIZE);
        }
        let three = Layer::from_cells([1, 1, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(catalog.index_of(three), None);
        assert_eq!(catalog.lookup(three), Err(CoreError::NotInCatalog(three.0)));
    }

    #[test]
    fn test_truncated_catalog() {
        let catalog = Catalog::build(PIECES_PER_SIZE, Some(50)).unwrap();
        assert_eq!(catalog.len(), 50);
        assert!(!catalog.is_closed());

        let full = Catalog::full();
        for i in 0..50 {
            assert_eq!(catalog.state_of(i), full.state_of(i));
        }
        // P1 single at cell 8 is index 54 in the full catalog.
        let outside = Layer::EMPTY.with(Pos(8), Some(Player::One));
        assert_eq!(full.index_of(outside), Some(54));
        assert_eq!(catalog.index_of(outside), None);
        assert!(matches!(
            catalog.state(50),
            Err(CoreError::LayerIndexOutOfRange { index: 50, len: 50 })
        ));
    }

    #[test]
    fn test_single_piece_catalog() {
        // Empty layer plus every single-piece layer: 1 + 9 + 9.
        let catalog = Catalog::build(1, Some(19)).unwrap();
        assert_eq!(catalog.len(), 19);
        assert!(catalog.is_closed());
        for &layer in catalog.states() {
            assert!(layer.count(Player::One) + layer.count(Player::Two) <= 1);
        }
        assert_eq!(Catalog::build(1, None).unwrap().len(), 91);
    }

    #[test]
    fn test_invalid_builds() {
        assert!(Catalog::build(PIECES_PER_SIZE, Some(0)).is_err());
        assert!(Catalog::build(0, None).is_err());
        // A limit beyond the catalog is just the whole catalog.
        assert_eq!(Catalog::build(PIECES_PER_SIZE, Some(5000)).unwrap().len(), 1423);
    }

    #[test]
    fn test_fingerprint_distinguishes_truncation() {
        let full = Catalog::full();
        let small = Catalog::build(PIECES_PER_SIZE, Some(50)).unwrap();
        assert_eq!(full.fingerprint(), Catalog::full().fingerprint());
        assert_ne!(full.fingerprint(), small.fingerprint());
    }

    #[test]
    fn test_layer_cells_roundtrip() {
        let cells = [1, 0, 2, 0, 0, 1, 2, 0, 0];
        let layer = Layer::from_cells(cells);
        assert_eq!(layer.cells(), cells);
        assert_eq!(layer.get(Pos(0)), Some(Player::One));
        assert_eq!(layer.get(Pos(2)), Some(Player::Two));
        assert_eq!(layer.get(Pos(1)), None);
        assert_eq!(layer.masks(), (0b000_100_001, 0b001_000_100));
        assert_eq!(layer.with(Pos(0), None).get(Pos(0)), None);
    }

    #[test]
    fn test_layer_permute_identity() {
        let layer = Layer::from_cells([1, 2, 0, 0, 1, 0, 0, 0, 2]);
        assert_eq!(layer.permute(&[0, 1, 2, 3, 4, 5, 6, 7, 8]), layer);
        // Horizontal flip: new[i] = old[mirror(i)]
        let flipped = layer.permute(&[2, 1, 0, 5, 4, 3, 8, 7, 6]);
        assert_eq!(flipped.cells(), [0, 2, 1, 0, 1, 0, 2, 0, 0]);
    }
}
