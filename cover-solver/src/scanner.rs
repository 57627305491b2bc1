//! Terminal scanner.
//!
//! Walks every board whose large-layer index falls in a slice and records each
//! won board's canonical form with its winner. Slices are independent, so
//! several processes can scan disjoint slices into one WAL database.

use std::sync::atomic::{AtomicBool, Ordering};

use cover_core::{
    canonicalize, pack, unpack, visibility_masks, winner_from_masks, BoardIndex, Catalog, Player,
};

use crate::config::{ScanConfig, LOG_INTERVAL_SECS};
use crate::error::Result;
use crate::stats::ScanStats;
use crate::store::{bind_catalog, parse_meta, Store};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    /// Won boards seen in this run, before symmetry reduction.
    pub found: u64,
    /// Canonical terminals newly written.
    pub inserted: u64,
    /// First outer index not yet finished.
    pub next_outer: usize,
    pub complete: bool,
}

/// Winner by the bitboard test, straight from catalog indices.
fn winner_at(catalog: &Catalog, index: BoardIndex) -> Option<Player> {
    let (large, medium, small) = unpack(index, catalog.radix());
    let (p1, p2) = visibility_masks(
        catalog.occupancy(large),
        catalog.occupancy(medium),
        catalog.occupancy(small),
    );
    winner_from_masks(p1, p2)
}

/// Scan one slice, resuming from its stored cursor.
///
/// The winner recorded is the one the canonical board shows, so a later
/// decode of the canonical index agrees with the stored row.
pub fn scan<S: Store + ?Sized>(
    catalog: &Catalog,
    store: &mut S,
    config: &ScanConfig,
    running: &AtomicBool,
) -> Result<ScanReport> {
    let radix = catalog.radix();
    config.validate(radix)?;
    bind_catalog(store, catalog)?;

    let key = config.cursor_key();
    let start = match store.meta(&key)? {
        Some(value) => parse_meta(&key, &value)? as usize,
        None => config.a_start,
    };
    let mut report = ScanReport {
        found: 0,
        inserted: 0,
        next_outer: start.max(config.a_start),
        complete: false,
    };
    if report.next_outer >= config.a_end {
        tracing::info!(slice = %key, "slice already complete");
        report.complete = true;
        return Ok(report);
    }
    if report.next_outer > config.a_start {
        tracing::info!(slice = %key, outer = report.next_outer, "resuming scan");
    }

    let r = radix.get() as usize;
    let mut stats = ScanStats::new();
    while report.next_outer < config.a_end {
        let a = report.next_outer;
        let large = catalog.occupancy(a);
        let mut in_batch = 0usize;
        store.begin()?;

        for b in 0..r {
            let medium = catalog.occupancy(b);
            for c in 0..r {
                let (p1, p2) = visibility_masks(large, medium, catalog.occupancy(c));
                let Some(winner) = winner_from_masks(p1, p2) else {
                    continue;
                };
                let canonical = canonicalize(catalog, pack(a, b, c, radix))?;
                let winner = winner_at(catalog, canonical).unwrap_or(winner);

                stats.found += 1;
                match winner {
                    Player::One => stats.p1_wins += 1,
                    Player::Two => stats.p2_wins += 1,
                }
                if store.insert_terminal(canonical, winner)? {
                    stats.inserted += 1;
                }

                in_batch += 1;
                if in_batch >= config.batch {
                    store.commit()?;
                    store.begin()?;
                    in_batch = 0;
                }
            }
        }

        // The cursor moves with the last rows of this outer index.
        report.next_outer = a + 1;
        store.set_meta(&key, &report.next_outer.to_string())?;
        store.commit()?;

        stats.boards += (r * r) as u64;
        stats.outer_done += 1;
        if stats.should_log(LOG_INTERVAL_SECS) {
            stats.log_progress(report.next_outer, config.a_end);
        }
        if !running.load(Ordering::SeqCst) {
            tracing::warn!(slice = %key, outer = report.next_outer, "scan interrupted");
            break;
        }
    }

    report.found = stats.found;
    report.inserted = stats.inserted;
    report.complete = report.next_outer >= config.a_end;
    stats.log_summary();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn single_piece() -> Catalog {
        Catalog::build(1, Some(19)).unwrap()
    }

    #[test]
    fn test_scan_single_piece_catalog() {
        let catalog = single_piece();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        let config = ScanConfig::full(catalog.radix(), 7);

        let report = scan(&catalog, &mut store, &config, &running).unwrap();
        // 2 players x 8 lines x 3! size orders.
        assert_eq!(report.found, 96);
        // 3 classes each for side lines, middle lines and diagonals.
        assert_eq!(report.inserted, 18);
        assert!(report.complete);

        let counts = store.counts().unwrap();
        assert_eq!(counts.p1_terminals, 9);
        assert_eq!(counts.p2_terminals, 9);
    }

    #[test]
    fn test_rescan_is_a_no_op() {
        let catalog = single_piece();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        let config = ScanConfig::full(catalog.radix(), 100);
        scan(&catalog, &mut store, &config, &running).unwrap();

        let again = scan(&catalog, &mut store, &config, &running).unwrap();
        assert!(again.complete);
        assert_eq!(again.found, 0);
        assert_eq!(store.counts().unwrap().terminals, 18);
    }

    #[test]
    fn test_interrupted_scan_resumes() {
        let catalog = single_piece();
        let mut store = MemoryStore::new();
        let config = ScanConfig::full(catalog.radix(), 3);

        let stopped = AtomicBool::new(false);
        let first = scan(&catalog, &mut store, &config, &stopped).unwrap();
        assert!(!first.complete);
        assert_eq!(first.next_outer, 1);
        assert_eq!(store.meta(&config.cursor_key()).unwrap().as_deref(), Some("1"));

        let running = AtomicBool::new(true);
        let rest = scan(&catalog, &mut store, &config, &running).unwrap();
        assert!(rest.complete);
        assert_eq!(first.found + rest.found, 96);
        assert_eq!(store.counts().unwrap().terminals, 18);
    }

    #[test]
    fn test_disjoint_slices_cover_the_space() {
        let catalog = single_piece();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        let mut found = 0;
        for (a_start, a_end) in [(0, 10), (10, 19)] {
            let config = ScanConfig { a_start, a_end, batch: 50 };
            found += scan(&catalog, &mut store, &config, &running).unwrap().found;
        }
        assert_eq!(found, 96);
        assert_eq!(store.counts().unwrap().terminals, 18);
    }

    #[test]
    fn test_recorded_winner_matches_canonical_board() {
        let catalog = Catalog::build(2, Some(50)).unwrap();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        let config = ScanConfig { a_start: 40, a_end: 50, batch: 1000 };
        scan(&catalog, &mut store, &config, &running).unwrap();

        let terminals = store.terminals_after(None, usize::MAX).unwrap();
        assert!(!terminals.is_empty());
        for (canonical, winner) in terminals {
            assert_eq!(canonicalize(&catalog, canonical).unwrap(), canonical);
            let board = cover_core::Board::decode(&catalog, canonical).unwrap();
            assert_eq!(board.winner(), Some(winner));
        }
    }

    #[test]
    fn test_invalid_slice_rejected() {
        let catalog = single_piece();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        let config = ScanConfig { a_start: 0, a_end: 20, batch: 10 };
        assert!(scan(&catalog, &mut store, &config, &running).is_err());
        // Nothing was bound or written.
        assert_eq!(store.meta(crate::store::META_RADIX).unwrap(), None);
    }
}
