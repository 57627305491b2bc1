//! Three stacked layers, the visible top view, and win detection.

use std::fmt;

use crate::catalog::{Catalog, Layer};
use crate::codec::{pack, unpack, BoardIndex};
use crate::error::CoreError;
use crate::{Player, Pos, Size};

/// The 8 winning lines: 3 rows, 3 columns, 2 diagonals.
pub const WIN_LINES: [[Pos; 3]; 8] = [
    [Pos(0), Pos(1), Pos(2)], // Row 0
    [Pos(3), Pos(4), Pos(5)], // Row 1
    [Pos(6), Pos(7), Pos(8)], // Row 2
    [Pos(0), Pos(3), Pos(6)], // Col 0
    [Pos(1), Pos(4), Pos(7)], // Col 1
    [Pos(2), Pos(5), Pos(8)], // Col 2
    [Pos(0), Pos(4), Pos(8)], // Main diagonal
    [Pos(2), Pos(4), Pos(6)], // Anti-diagonal
];

/// Bitmasks for `WIN_LINES`, bit i for cell i.
pub const WIN_MASKS: [u16; 8] = [
    0b000_000_111, // Row 0: cells 0,1,2
    0b000_111_000, // Row 1: cells 3,4,5
    0b111_000_000, // Row 2: cells 6,7,8
    0b001_001_001, // Col 0: cells 0,3,6
    0b010_010_010, // Col 1: cells 1,4,7
    0b100_100_100, // Col 2: cells 2,5,8
    0b100_010_001, // Main diagonal: cells 0,4,8
    0b001_010_100, // Anti-diagonal: cells 2,4,6
];

/// A board as three independent layers, indexed by [`Size`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Board {
    layers: [Layer; 3],
}

impl Board {
    /// Empty board.
    #[inline]
    pub fn new() -> Board {
        Board::default()
    }

    pub fn from_layers(large: Layer, medium: Layer, small: Layer) -> Board {
        Board {
            layers: [small, medium, large],
        }
    }

    #[inline]
    pub fn layer(&self, size: Size) -> Layer {
        self.layers[size as usize]
    }

    #[inline]
    pub fn set_layer(&mut self, size: Size, layer: Layer) {
        self.layers[size as usize] = layer;
    }

    /// Decode a board index against `catalog`.
    pub fn decode(catalog: &Catalog, index: BoardIndex) -> Result<Board, CoreError> {
        let radix = catalog.radix();
        if index >= radix.space() {
            return Err(CoreError::BoardIndexOutOfRange {
                index,
                radix: radix.get(),
            });
        }
        let (large, medium, small) = unpack(index, radix);
        Ok(Board::from_layers(
            catalog.state(large)?,
            catalog.state(medium)?,
            catalog.state(small)?,
        ))
    }

    /// Encode against `catalog`; fails if any layer is not in the catalog.
    pub fn encode(&self, catalog: &Catalog) -> Result<BoardIndex, CoreError> {
        Ok(pack(
            catalog.lookup(self.layer(Size::Large))?,
            catalog.lookup(self.layer(Size::Medium))?,
            catalog.lookup(self.layer(Size::Small))?,
            catalog.radix(),
        ))
    }

    /// Encode, or `None` when a layer is not representable.
    pub fn try_encode(&self, catalog: &Catalog) -> Option<BoardIndex> {
        Some(pack(
            catalog.index_of(self.layer(Size::Large))?,
            catalog.index_of(self.layer(Size::Medium))?,
            catalog.index_of(self.layer(Size::Small))?,
            catalog.radix(),
        ))
    }

    /// Owner of the `size` piece at `pos`, if any.
    #[inline]
    pub fn piece_owner(&self, pos: Pos, size: Size) -> Option<Player> {
        self.layer(size).get(pos)
    }

    /// The visible piece at `pos`: the largest one present.
    pub fn top_piece(&self, pos: Pos) -> Option<(Player, Size)> {
        Size::LARGEST_FIRST
            .iter()
            .find_map(|&size| self.piece_owner(pos, size).map(|p| (p, size)))
    }

    /// A piece of `size` can go on `pos` if its slot is free and whatever shows
    /// on top is strictly smaller.
    #[inline]
    pub fn can_place(&self, size: Size, pos: Pos) -> bool {
        match self.top_piece(pos) {
            None => true,
            Some((_, top_size)) => size.can_gobble(top_size),
        }
    }

    /// Pieces on board per size for `player`: `[small, medium, large]`.
    pub fn pieces_on_board(&self, player: Player) -> [u8; 3] {
        self.layers.map(|layer| layer.count(player))
    }

    /// Total pieces on board, both players, all sizes.
    pub fn piece_count(&self) -> u32 {
        Player::BOTH
            .iter()
            .map(|&p| self.pieces_on_board(p).iter().map(|&n| n as u32).sum::<u32>())
            .sum()
    }

    /// Put `player`'s `size` piece on `pos`. Does not validate.
    #[inline]
    pub fn push_piece(&mut self, pos: Pos, player: Player, size: Size) {
        let layer = self.layer(size).with(pos, Some(player));
        self.set_layer(size, layer);
    }

    /// Clear the `size` slot at `pos`.
    #[inline]
    pub fn remove_piece(&mut self, pos: Pos, size: Size) {
        let layer = self.layer(size).with(pos, None);
        self.set_layer(size, layer);
    }

    pub fn top_view(&self) -> TopView {
        TopView::from_layers(
            self.layer(Size::Large),
            self.layer(Size::Medium),
            self.layer(Size::Small),
        )
    }

    /// Winner by top view, first line in `WIN_LINES` order.
    pub fn winner(&self) -> Option<Player> {
        self.top_view().winner()
    }

    /// Visible-cell masks for both players.
    pub fn visibility_masks(&self) -> (u16, u16) {
        visibility_masks(
            self.layer(Size::Large).masks(),
            self.layer(Size::Medium).masks(),
            self.layer(Size::Small).masks(),
        )
    }

    /// Same answer as [`Board::winner`], via bitmasks.
    pub fn winner_fast(&self) -> Option<Player> {
        let (p1, p2) = self.visibility_masks();
        winner_from_masks(p1, p2)
    }

    /// Apply a cell mapping (`new_pos -> old_pos`) to every layer.
    pub fn transform(&self, mapping: &[u8; 9]) -> Board {
        Board {
            layers: self.layers.map(|layer| layer.permute(mapping)),
        }
    }
}

impl fmt::Display for Board {
    /// Each cell prints its stack large/medium/small, e.g. `1.2` is a P1
    /// large covering a P2 small.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            let cells: Vec<String> = (0..3)
                .map(|col| {
                    let pos = Pos::from_row_col(row, col);
                    Size::LARGEST_FIRST
                        .iter()
                        .map(|&size| match self.piece_owner(pos, size) {
                            Some(p) => char::from(b'0' + p as u8),
                            None => '.',
                        })
                        .collect()
                })
                .collect();
            writeln!(f, "{}", cells.join(" | "))?;
        }
        Ok(())
    }
}

/// Per-cell owner of the visible piece.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TopView(pub [Option<Player>; 9]);

impl TopView {
    /// Large beats medium beats small.
    pub fn from_layers(large: Layer, medium: Layer, small: Layer) -> TopView {
        let mut view = [None; 9];
        for pos in Pos::all() {
            view[pos.0 as usize] = large.get(pos).or(medium.get(pos)).or(small.get(pos));
        }
        TopView(view)
    }

    #[inline]
    pub fn get(&self, pos: Pos) -> Option<Player> {
        self.0[pos.0 as usize]
    }

    /// Owner of the first fully-owned line.
    ///
    /// A board showing complete lines for both players cannot arise in play;
    /// if one is passed in, whichever line comes first wins.
    pub fn winner(&self) -> Option<Player> {
        WIN_LINES.iter().find_map(|line| {
            let owner = self.get(line[0])?;
            (self.get(line[1]) == Some(owner) && self.get(line[2]) == Some(owner)).then_some(owner)
        })
    }

    /// Lines fully owned by `player`, in `WIN_LINES` order.
    pub fn completed_lines(&self, player: Player) -> impl Iterator<Item = &'static [Pos; 3]> + '_ {
        WIN_LINES
            .iter()
            .filter(move |line| line.iter().all(|&pos| self.get(pos) == Some(player)))
    }

    pub fn has_line(&self, player: Player) -> bool {
        self.completed_lines(player).next().is_some()
    }
}

impl fmt::Display for TopView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..3 {
            let line: String = (0..3)
                .map(|col| match self.get(Pos::from_row_col(row, col)) {
                    Some(Player::One) => 'X',
                    Some(Player::Two) => 'O',
                    None => '.',
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Visible cells per player from per-layer occupancy masks.
#[inline]
pub fn visibility_masks(large: (u16, u16), medium: (u16, u16), small: (u16, u16)) -> (u16, u16) {
    let covered_by_large = large.0 | large.1;
    let covered = covered_by_large | medium.0 | medium.1;
    let p1 = large.0 | (medium.0 & !covered_by_large) | (small.0 & !covered);
    let p2 = large.1 | (medium.1 & !covered_by_large) | (small.1 & !covered);
    (p1, p2)
}

/// Winner from visible-cell masks, checking lines in `WIN_MASKS` order.
#[inline]
pub fn winner_from_masks(p1: u16, p2: u16) -> Option<Player> {
    for &mask in &WIN_MASKS {
        if p1 & mask == mask {
            return Some(Player::One);
        }
        if p2 & mask == mask {
            return Some(Player::Two);
        }
    }
    None
}
