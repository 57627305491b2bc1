//! Retrograde solver.
//!
//! Works backward from terminal positions. Each won board seeds its loser
//! (the player to move) as a loss at depth 0; resolved nodes are expanded
//! from a FIFO queue into their predecessors until the queue drains. Nodes
//! never reached stay unseen, which means draw or undetermined.
//!
//! All state lives in the [`Store`], so a run can stop at any batch boundary
//! and pick up again.

use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use cover_core::{
    distinct_successors, outdegree, predecessors, unmoves, Board, CanonicalIndex, Catalog, Player,
};
use serde::{Deserialize, Serialize};

use crate::config::SolveConfig;
use crate::error::{Result, SolverError};
use crate::stats::SolveStats;
use crate::store::{bind_catalog, parse_meta, NodeState, Outcome, QueueItem, Store};

pub const META_RULE: &str = "rule";
pub const META_SEED: &str = "seed";
const META_SEED_CURSOR: &str = "seed_cursor";

/// How a resolved node propagates to its predecessors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    /// AND/OR induction. A predecessor of a loss is a win; a predecessor is a
    /// loss once every distinct successor is a win.
    #[default]
    Standard,
    /// Only line-completing predecessors of each resolved loss are visited.
    /// Each gets a counter set to its raw move count and is decremented once
    /// on first sight; a counter reaching zero marks a loss. Never produces a
    /// win and leaves the winning side of each line pending.
    LineCompletion,
}

impl Rule {
    pub fn as_str(self) -> &'static str {
        match self {
            Rule::Standard => "standard",
            Rule::LineCompletion => "line-completion",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolveReport {
    pub seeded: u64,
    pub processed: u64,
    pub wins: u64,
    pub losses: u64,
    pub max_depth: u32,
    /// False if the run stopped on an interrupt with work queued.
    pub complete: bool,
}

/// Retrograde solver over a store.
pub struct Solver<'a, S: Store + ?Sized> {
    catalog: &'a Catalog,
    store: &'a mut S,
    config: SolveConfig,
    pub stats: SolveStats,
}

impl<'a, S: Store + ?Sized> Solver<'a, S> {
    /// Validates the config and binds the catalog and rule to the store.
    pub fn new(catalog: &'a Catalog, store: &'a mut S, config: SolveConfig) -> Result<Self> {
        config.validate()?;
        bind_catalog(store, catalog)?;

        match store.meta(META_RULE)? {
            Some(stored) if stored != config.rule.as_str() => {
                return Err(SolverError::Config(format!(
                    "store was solved with rule {}, not {}",
                    stored,
                    config.rule.as_str()
                )));
            }
            Some(_) => {}
            None => {
                store.begin()?;
                store.set_meta(META_RULE, config.rule.as_str())?;
                store.commit()?;
            }
        }

        Ok(Self {
            catalog,
            store,
            config,
            stats: SolveStats::new(),
        })
    }

    /// Seed and then drain the queue.
    pub fn solve(&mut self, running: &AtomicBool) -> Result<SolveReport> {
        let seeded = self.seed(running)?;
        let complete = seeded && self.run(running)?;
        self.stats.log_summary();
        Ok(SolveReport {
            seeded: self.stats.seeded,
            processed: self.stats.processed,
            wins: self.stats.wins,
            losses: self.stats.losses,
            max_depth: self.stats.max_depth,
            complete,
        })
    }

    /// Queue every terminal's loser as a loss at depth 0.
    ///
    /// Terminals are paged in canonical order with the cursor committed per
    /// page. Returns false if interrupted before all terminals were seeded.
    pub fn seed(&mut self, running: &AtomicBool) -> Result<bool> {
        if self.store.meta(META_SEED)?.as_deref() == Some("done") {
            return Ok(true);
        }
        let mut cursor = match self.store.meta(META_SEED_CURSOR)? {
            Some(value) => Some(parse_meta(META_SEED_CURSOR, &value)?),
            None => None,
        };

        loop {
            let page = self.store.terminals_after(cursor, self.config.batch)?;
            let Some(&(last, _)) = page.last() else {
                break;
            };
            self.store.begin()?;
            for (canonical, winner) in page {
                let loser = winner.opponent();
                if self.store.resolve(canonical, loser, Outcome::Loss, 0)? {
                    self.store.push(QueueItem {
                        canonical,
                        player: loser,
                        depth: 0,
                    })?;
                    self.stats.seeded += 1;
                    self.stats.losses += 1;
                }
            }
            cursor = Some(last);
            self.store.set_meta(META_SEED_CURSOR, &last.to_string())?;
            self.store.commit()?;

            if !running.load(Ordering::SeqCst) {
                tracing::warn!(cursor = last, "seeding interrupted");
                return Ok(false);
            }
        }

        self.store.begin()?;
        self.store.set_meta(META_SEED, "done")?;
        self.store.commit()?;
        tracing::info!(seeded = self.stats.seeded, rule = self.config.rule.as_str(), "seeded");
        Ok(true)
    }

    /// Drain the queue in batches. Returns false if interrupted.
    pub fn run(&mut self, running: &AtomicBool) -> Result<bool> {
        loop {
            self.store.begin()?;
            let mut drained = false;
            for _ in 0..self.config.batch {
                match self.store.pop()? {
                    Some(item) => self.expand(item)?,
                    None => {
                        drained = true;
                        break;
                    }
                }
                if !running.load(Ordering::SeqCst) {
                    break;
                }
            }
            self.store.commit()?;

            if self.stats.should_log(self.config.log_interval_secs) {
                self.stats.log_progress();
            }
            if drained {
                return Ok(true);
            }
            if !running.load(Ordering::SeqCst) {
                tracing::warn!(processed = self.stats.processed, "solve interrupted");
                return Ok(false);
            }
        }
    }

    /// Propagate one resolved node.
    fn expand(&mut self, item: QueueItem) -> Result<()> {
        self.stats.processed += 1;
        self.stats.record_depth(item.depth);
        match self.config.rule {
            Rule::Standard => self.expand_standard(item),
            Rule::LineCompletion => self.expand_line_completion(item),
        }
    }

    fn expand_standard(&mut self, item: QueueItem) -> Result<()> {
        let child = match self.store.state(item.canonical, item.player)? {
            Some(NodeState::Resolved { outcome, .. }) => outcome,
            other => {
                return Err(SolverError::Corrupt(format!(
                    "queued node {}/{:?} is {:?}",
                    item.canonical, item.player, other
                )))
            }
        };
        let mover = item.player.opponent();
        let depth = item.depth + 1;

        for pred in unmoves(self.catalog, item.canonical, mover)? {
            match child {
                // One losing reply is enough.
                Outcome::Loss => {
                    if self.store.resolve(pred, mover, Outcome::Win, depth)? {
                        self.enqueue(pred, mover, depth, Outcome::Win)?;
                    }
                }
                Outcome::Win => {
                    match self.store.state(pred, mover)? {
                        Some(NodeState::Resolved { .. }) => continue,
                        Some(NodeState::Pending { .. }) => {}
                        None => {
                            let board = Board::decode(self.catalog, pred)?;
                            let successors = distinct_successors(self.catalog, &board, mover)?;
                            self.store
                                .insert_pending(pred, mover, successors.len() as u32)?;
                            self.stats.discovered += 1;
                        }
                    }
                    if self.store.decrement(pred, mover)? == Some(0)
                        && self.store.resolve(pred, mover, Outcome::Loss, depth)?
                    {
                        self.enqueue(pred, mover, depth, Outcome::Loss)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn expand_line_completion(&mut self, item: QueueItem) -> Result<()> {
        let mover = item.player.opponent();
        let depth = item.depth + 1;

        for pred in predecessors(self.catalog, item.canonical, mover)? {
            if self.store.state(pred, mover)?.is_some() {
                continue;
            }
            let degree = self.raw_outdegree(pred, mover)?;
            self.store.insert_pending(pred, mover, degree)?;
            self.stats.discovered += 1;
            if self.store.decrement(pred, mover)? == Some(0)
                && self.store.resolve(pred, mover, Outcome::Loss, depth)?
            {
                self.enqueue(pred, mover, depth, Outcome::Loss)?;
            }
        }
        Ok(())
    }

    /// Move count from the `outdegree` table, or generated if not built.
    fn raw_outdegree(&self, canonical: CanonicalIndex, player: Player) -> Result<u32> {
        if let Some(count) = self.store.outdegree(canonical, player)? {
            return Ok(count);
        }
        let board = Board::decode(self.catalog, canonical)?;
        Ok(outdegree(self.catalog, &board, player) as u32)
    }

    fn enqueue(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        depth: u32,
        outcome: Outcome,
    ) -> Result<()> {
        match outcome {
            Outcome::Win => self.stats.wins += 1,
            Outcome::Loss => self.stats.losses += 1,
        }
        self.store.push(QueueItem {
            canonical,
            player,
            depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::scanner::scan;
    use crate::store::MemoryStore;

    #[test]
    fn test_rule_names() {
        assert_eq!(Rule::default(), Rule::Standard);
        assert_eq!(Rule::from_str("line-completion", true), Ok(Rule::LineCompletion));
        assert_eq!(serde_json::to_string(&Rule::LineCompletion).unwrap(), "\"line-completion\"");
    }

    #[test]
    fn test_empty_store_solves_to_nothing() {
        let catalog = Catalog::build(1, Some(19)).unwrap();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        let mut solver = Solver::new(&catalog, &mut store, SolveConfig::default()).unwrap();
        let report = solver.solve(&running).unwrap();
        assert!(report.complete);
        assert_eq!(report.processed, 0);
    }

    #[test]
    fn test_rule_is_bound_to_store() {
        let catalog = Catalog::build(1, Some(19)).unwrap();
        let mut store = MemoryStore::new();
        Solver::new(&catalog, &mut store, SolveConfig::default()).unwrap();
        let other = SolveConfig {
            rule: Rule::LineCompletion,
            ..SolveConfig::default()
        };
        assert!(matches!(
            Solver::new(&catalog, &mut store, other),
            Err(SolverError::Config(_))
        ));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let catalog = Catalog::build(1, Some(19)).unwrap();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        scan(&catalog, &mut store, &ScanConfig::full(catalog.radix(), 100), &running).unwrap();

        let config = SolveConfig { batch: 4, ..SolveConfig::default() };
        let mut solver = Solver::new(&catalog, &mut store, config.clone()).unwrap();
        assert!(solver.seed(&running).unwrap());
        assert_eq!(solver.stats.seeded, 18);

        let mut again = Solver::new(&catalog, &mut store, config).unwrap();
        assert!(again.seed(&running).unwrap());
        assert_eq!(again.stats.seeded, 0);
        assert_eq!(store.counts().unwrap().queued, 18);
    }

    #[test]
    fn test_interrupted_seed_resumes() {
        let catalog = Catalog::build(1, Some(19)).unwrap();
        let mut store = MemoryStore::new();
        let running = AtomicBool::new(true);
        scan(&catalog, &mut store, &ScanConfig::full(catalog.radix(), 100), &running).unwrap();

        let config = SolveConfig { batch: 5, ..SolveConfig::default() };
        let stopped = AtomicBool::new(false);
        let mut solver = Solver::new(&catalog, &mut store, config.clone()).unwrap();
        assert!(!solver.seed(&stopped).unwrap());
        assert_eq!(solver.stats.seeded, 5);

        let mut solver = Solver::new(&catalog, &mut store, config).unwrap();
        assert!(solver.seed(&running).unwrap());
        assert_eq!(solver.stats.seeded, 13);
    }
}
