//! Move-table builder.
//!
//! Materializes the `moves` and `outdegree` tables for every canonical,
//! non-terminal board in an index range. The solver does not need them; it
//! regenerates moves on demand. The tables are for inspection and for
//! cross-checking the reverse generators.

use std::sync::atomic::{AtomicBool, Ordering};

use cover_core::{canonicalize, cover_moves, Board, Catalog, Player};

use crate::config::{MovesConfig, LOG_INTERVAL_SECS};
use crate::error::Result;
use crate::stats::MovesStats;
use crate::store::{bind_catalog, parse_meta, MoveRecord, Store};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovesReport {
    /// Canonical non-terminal boards expanded in this run.
    pub boards: u64,
    pub moves: u64,
    pub next_index: u64,
    pub complete: bool,
}

/// Build move rows for `config.start..config.end`, resuming from the stored
/// cursor. A board's rows and its outdegree are committed together.
pub fn build_moves<S: Store + ?Sized>(
    catalog: &Catalog,
    store: &mut S,
    config: &MovesConfig,
    running: &AtomicBool,
) -> Result<MovesReport> {
    config.validate(catalog.radix())?;
    bind_catalog(store, catalog)?;

    let key = config.cursor_key();
    let mut index = match store.meta(&key)? {
        Some(value) => parse_meta(&key, &value)?.max(config.start),
        None => config.start,
    };
    if index > config.start && index < config.end {
        tracing::info!(range = %key, index, "resuming move table");
    }

    let mut stats = MovesStats::new();
    let mut in_batch = 0usize;
    let mut interrupted = false;
    store.begin()?;

    while index < config.end {
        stats.indices += 1;
        if canonicalize(catalog, index)? == index {
            let board = Board::decode(catalog, index)?;
            // Won boards are terminal.
            if board.winner().is_none() {
                stats.canonical += 1;
                for player in Player::BOTH {
                    let mut count = 0u32;
                    for next in cover_moves(catalog, &board, player) {
                        let to = canonicalize(catalog, next.encode(catalog)?)?;
                        store.insert_move(MoveRecord {
                            from: index,
                            from_player: player,
                            to,
                            to_player: player.opponent(),
                        })?;
                        count += 1;
                    }
                    store.set_outdegree(index, player, count)?;
                    stats.moves += count as u64;
                    in_batch += count as usize + 1;
                }
            }
        }
        index += 1;

        if in_batch >= config.batch {
            store.set_meta(&key, &index.to_string())?;
            store.commit()?;
            in_batch = 0;
            if stats.should_log(LOG_INTERVAL_SECS) {
                stats.log_progress(index, config.end);
            }
            if !running.load(Ordering::SeqCst) {
                tracing::warn!(range = %key, index, "move table interrupted");
                interrupted = true;
                break;
            }
            store.begin()?;
        }
    }

    if !interrupted {
        store.set_meta(&key, &index.to_string())?;
        store.commit()?;
    }
    stats.log_summary();

    Ok(MovesReport {
        boards: stats.canonical,
        moves: stats.moves,
        next_index: index,
        complete: index >= config.end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use cover_core::{canonical_board, distinct_successors, outdegree, Pos, Size};

    #[test]
    fn test_outdegree_rows_match_generator() {
        let catalog = Catalog::build(1, Some(19)).unwrap();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        let config = MovesConfig::full(catalog.radix(), 500);
        let report = build_moves(&catalog, &mut store, &config, &running).unwrap();
        assert!(report.complete);

        let mut board = Board::new();
        board.push_piece(Pos(0), Player::One, Size::Large);
        board.push_piece(Pos(2), Player::One, Size::Small);
        let canonical = canonical_board(&catalog, &board).unwrap();
        let decoded = Board::decode(&catalog, canonical).unwrap();

        for player in Player::BOTH {
            let expected = outdegree(&catalog, &decoded, player) as u32;
            assert_eq!(store.outdegree(canonical, player).unwrap(), Some(expected));
            let rows = store.moves_from(canonical, player).unwrap();
            assert_eq!(rows.len() as u32, expected);
            let mut targets: Vec<u64> = rows.iter().map(|m| m.to).collect();
            targets.sort_unstable();
            targets.dedup();
            assert_eq!(targets, distinct_successors(&catalog, &decoded, player).unwrap());
            assert!(rows.iter().all(|m| m.to_player == player.opponent()));
        }
        // P1 has only the medium left: 8 cells (the large at 0 blocks one).
        assert_eq!(store.outdegree(canonical, Player::One).unwrap(), Some(8));
    }

    #[test]
    fn test_terminals_and_non_canonical_skipped() {
        let catalog = Catalog::build(1, Some(19)).unwrap();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        build_moves(&catalog, &mut store, &MovesConfig::full(catalog.radix(), 64), &running)
            .unwrap();

        let mut win = Board::new();
        win.push_piece(Pos(0), Player::One, Size::Large);
        win.push_piece(Pos(1), Player::One, Size::Medium);
        win.push_piece(Pos(2), Player::One, Size::Small);
        let terminal = canonical_board(&catalog, &win).unwrap();
        assert_eq!(store.outdegree(terminal, Player::Two).unwrap(), None);

        // A large P1 piece on corner 8 is not canonical (corner 0 is smaller).
        let mut corner = Board::new();
        corner.push_piece(Pos(8), Player::One, Size::Large);
        let raw = corner.encode(&catalog).unwrap();
        assert_ne!(canonicalize(&catalog, raw).unwrap(), raw);
        assert_eq!(store.outdegree(raw, Player::One).unwrap(), None);
    }

    #[test]
    fn test_interrupted_build_resumes_without_duplicates() {
        let catalog = Catalog::build(1, Some(19)).unwrap();
        let config = MovesConfig::full(catalog.radix(), 40);

        let mut whole = MemoryStore::new();
        build_moves(&catalog, &mut whole, &config, &AtomicBool::new(true)).unwrap();

        let mut parts = MemoryStore::new();
        let first = build_moves(&catalog, &mut parts, &config, &AtomicBool::new(false)).unwrap();
        assert!(!first.complete);
        let rest = build_moves(&catalog, &mut parts, &config, &AtomicBool::new(true)).unwrap();
        assert!(rest.complete);

        assert_eq!(parts.counts().unwrap().moves, whole.counts().unwrap().moves);
        assert_eq!(parts.counts().unwrap().outdegrees, whole.counts().unwrap().outdegrees);
    }
}
