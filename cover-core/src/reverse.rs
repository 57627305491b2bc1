//! Predecessor generation: undo a cover move.
//!
//! Both generators take a canonical index and the player who made the last
//! move, and return canonical predecessors with that player to move.
//! Candidates whose layers fall outside the catalog are skipped.

use crate::board::{Board, WIN_LINES};
use crate::catalog::Catalog;
use crate::codec::CanonicalIndex;
use crate::error::CoreError;
use crate::symmetry::canonicalize;
use crate::{Player, Pos, Size};

/// Clear `player`'s visible piece at `pos`, if it has one there.
fn lift(board: &Board, pos: Pos, player: Player) -> Option<Board> {
    let size = Size::LARGEST_FIRST
        .into_iter()
        .find(|&size| board.piece_owner(pos, size) == Some(player))?;
    let mut prev = *board;
    prev.remove_piece(pos, size);
    Some(prev)
}

fn canonical_of(catalog: &Catalog, board: &Board) -> Option<Result<CanonicalIndex, CoreError>> {
    board.try_encode(catalog).map(|index| canonicalize(catalog, index))
}

/// Predecessors through the last cell of a completed line.
///
/// For every line fully showing `moving_player`, each of its three cells is
/// lifted in turn. One candidate per (line, cell) in line order, duplicates
/// kept.
pub fn predecessors(
    catalog: &Catalog,
    canonical: CanonicalIndex,
    moving_player: Player,
) -> Result<Vec<CanonicalIndex>, CoreError> {
    let board = Board::decode(catalog, canonical)?;
    let view = board.top_view();

    let mut out = Vec::new();
    for line in WIN_LINES.iter() {
        if !line.iter().all(|&pos| view.get(pos) == Some(moving_player)) {
            continue;
        }
        for &pos in line {
            let Some(prev) = lift(&board, pos, moving_player) else {
                continue;
            };
            if let Some(index) = canonical_of(catalog, &prev) {
                out.push(index?);
            }
        }
    }
    Ok(out)
}

/// Every position from which one cover move by `moving_player` reaches
/// `canonical`.
///
/// Lifts each visible `moving_player` piece. Predecessors that already show a
/// winner are dropped, since no move is made from a finished game. Sorted and
/// deduplicated.
pub fn unmoves(
    catalog: &Catalog,
    canonical: CanonicalIndex,
    moving_player: Player,
) -> Result<Vec<CanonicalIndex>, CoreError> {
    let board = Board::decode(catalog, canonical)?;
    let view = board.top_view();

    let mut out = Vec::new();
    for pos in Pos::all() {
        if view.get(pos) != Some(moving_player) {
            continue;
        }
        let Some(prev) = lift(&board, pos, moving_player) else {
            continue;
        };
        if prev.winner().is_some() {
            continue;
        }
        if let Some(index) = canonical_of(catalog, &prev) {
            out.push(index?);
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}
