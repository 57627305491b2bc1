//! Lazy cover-move generator.
//!
//! A cover move places an unused piece on a cell that is empty or shows a
//! strictly smaller piece. Pieces already on the board never move.

use crate::board::Board;
use crate::catalog::Catalog;
use crate::codec::CanonicalIndex;
use crate::error::CoreError;
use crate::symmetry::canonicalize;
use crate::{Player, Pos, Size};

/// Produces successor boards one at a time.
///
/// Generation order:
/// 1. Sizes Large → Medium → Small
/// 2. Destination cells 0..9
///
/// Cloning the iterator restarts nothing; it forks the current position.
#[derive(Clone, Debug)]
pub struct CoverMoves<'a> {
    catalog: &'a Catalog,
    board: Board,
    player: Player,
    /// Pieces of each size already on the board, `[small, medium, large]`.
    placed: [u8; 3],
    /// Index into `Size::LARGEST_FIRST`.
    size_idx: usize,
    dest_idx: u8,
}

impl<'a> CoverMoves<'a> {
    pub fn new(catalog: &'a Catalog, board: &Board, player: Player) -> Self {
        Self {
            catalog,
            board: *board,
            player,
            placed: board.pieces_on_board(player),
            size_idx: 0,
            dest_idx: 0,
        }
    }
}

impl Iterator for CoverMoves<'_> {
    type Item = Board;

    fn next(&mut self) -> Option<Board> {
        while self.size_idx < Size::LARGEST_FIRST.len() {
            let size = Size::LARGEST_FIRST[self.size_idx];

            // Skip sizes with no piece left in hand
            if self.placed[size as usize] < self.catalog.max_per_player() {
                while self.dest_idx < 9 {
                    let dest = Pos(self.dest_idx);
                    self.dest_idx += 1;

                    if !self.board.can_place(size, dest) {
                        continue;
                    }
                    let mut next = self.board;
                    next.push_piece(dest, self.player, size);
                    // A truncated catalog may not hold the new layer
                    if self.catalog.contains(next.layer(size)) {
                        return Some(next);
                    }
                }
            }

            self.size_idx += 1;
            self.dest_idx = 0;
        }
        None
    }
}

/// All cover moves for `player` on `board`.
pub fn cover_moves<'a>(catalog: &'a Catalog, board: &Board, player: Player) -> CoverMoves<'a> {
    CoverMoves::new(catalog, board, player)
}

/// Number of legal cover moves, counting symmetric duplicates separately.
pub fn outdegree(catalog: &Catalog, board: &Board, player: Player) -> usize {
    cover_moves(catalog, board, player).count()
}

/// Sorted, deduplicated canonical indices of every successor.
pub fn distinct_successors(
    catalog: &Catalog,
    board: &Board,
    player: Player,
) -> Result<Vec<CanonicalIndex>, CoreError> {
    let mut successors = cover_moves(catalog, board, player)
        .map(|next| canonicalize(catalog, next.encode(catalog)?))
        .collect::<Result<Vec<_>, _>>()?;
    successors.sort_unstable();
    successors.dedup();
    Ok(successors)
}
