//! Persistent solver state.
//!
//! The [`Store`] trait is the only thing the scanner, move builder and solver
//! see. [`SqliteStore`] is the real engine; [`MemoryStore`] keeps the same
//! semantics in maps and is used for small runs and tests.
//!
//! Tables:
//! - `meta`: key/value (radix, catalog fingerprint, stage cursors)
//! - `terminals`: canonical -> winner, insert-if-absent
//! - `moves`: append-only (from, from_player, to, to_player)
//! - `outdegree`: (canonical, player) -> count
//! - `states`: (canon, player) -> value, depth, remaining
//! - `queue`: FIFO of (canon, player, depth)

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::time::Duration;

use cover_core::{CanonicalIndex, Catalog, Player};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SolverError};

pub const META_RADIX: &str = "radix";
pub const META_FINGERPRINT: &str = "catalog_fingerprint";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS terminals (
    canonical INTEGER PRIMARY KEY,
    winner INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS moves (
    from_canonical INTEGER NOT NULL,
    from_player INTEGER NOT NULL,
    to_canonical INTEGER NOT NULL,
    to_player INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS moves_from ON moves (from_canonical, from_player);
CREATE TABLE IF NOT EXISTS outdegree (
    canonical INTEGER NOT NULL,
    player INTEGER NOT NULL,
    count INTEGER NOT NULL,
    PRIMARY KEY (canonical, player)
);
CREATE TABLE IF NOT EXISTS states (
    canon INTEGER NOT NULL,
    player INTEGER NOT NULL,
    value INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    remaining INTEGER NOT NULL,
    PRIMARY KEY (canon, player)
);
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    canon INTEGER NOT NULL,
    player INTEGER NOT NULL,
    depth INTEGER NOT NULL
);
";

/// Game-theoretic value for the player to move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Loss,
    Win,
}

impl Outcome {
    /// Stored value: -1 loss, +1 win.
    pub fn value(self) -> i8 {
        match self {
            Outcome::Loss => -1,
            Outcome::Win => 1,
        }
    }

    pub fn from_value(value: i8) -> Option<Outcome> {
        match value {
            -1 => Some(Outcome::Loss),
            1 => Some(Outcome::Win),
            _ => None,
        }
    }
}

/// A row of the `states` table. Absence of a row means unseen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Pending { remaining: u32 },
    Resolved { outcome: Outcome, depth: u32 },
}

impl NodeState {
    /// -1 / 0 / +1 as stored.
    pub fn value(self) -> i8 {
        match self {
            NodeState::Pending { .. } => 0,
            NodeState::Resolved { outcome, .. } => outcome.value(),
        }
    }

    /// Plies to the forced outcome, -1 while pending.
    pub fn depth(self) -> i64 {
        match self {
            NodeState::Pending { .. } => -1,
            NodeState::Resolved { depth, .. } => depth as i64,
        }
    }

    pub fn outcome(self) -> Option<Outcome> {
        match self {
            NodeState::Pending { .. } => None,
            NodeState::Resolved { outcome, .. } => Some(outcome),
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, NodeState::Resolved { .. })
    }
}

/// Work queue entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueItem {
    pub canonical: CanonicalIndex,
    pub player: Player,
    pub depth: u32,
}

/// One cover move between canonical positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveRecord {
    pub from: CanonicalIndex,
    pub from_player: Player,
    pub to: CanonicalIndex,
    pub to_player: Player,
}

/// A resolved `states` row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolvedState {
    pub canonical: CanonicalIndex,
    pub player: Player,
    pub outcome: Outcome,
    pub depth: u32,
}

/// Row counts for the `summary` command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub terminals: u64,
    pub p1_terminals: u64,
    pub p2_terminals: u64,
    pub moves: u64,
    pub outdegrees: u64,
    pub pending: u64,
    pub wins: u64,
    pub losses: u64,
    pub queued: u64,
    pub max_depth: Option<u32>,
}

/// Storage contract shared by every stage.
///
/// Writes between `begin` and `commit` form one unit. SQLite rolls back an
/// uncommitted unit if the process dies.
pub trait Store {
    /// Open a write transaction. A no-op if one is already open.
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;

    fn meta(&self, key: &str) -> Result<Option<String>>;
    fn set_meta(&mut self, key: &str, value: &str) -> Result<()>;

    /// Returns `true` if the row is new.
    fn insert_terminal(&mut self, canonical: CanonicalIndex, winner: Player) -> Result<bool>;
    fn terminal(&self, canonical: CanonicalIndex) -> Result<Option<Player>>;
    /// Terminals with canonical strictly above `after`, ascending.
    fn terminals_after(
        &self,
        after: Option<CanonicalIndex>,
        limit: usize,
    ) -> Result<Vec<(CanonicalIndex, Player)>>;

    fn insert_move(&mut self, record: MoveRecord) -> Result<()>;
    fn moves_from(&self, canonical: CanonicalIndex, player: Player) -> Result<Vec<MoveRecord>>;
    fn set_outdegree(&mut self, canonical: CanonicalIndex, player: Player, count: u32)
        -> Result<()>;
    fn outdegree(&self, canonical: CanonicalIndex, player: Player) -> Result<Option<u32>>;

    fn state(&self, canonical: CanonicalIndex, player: Player) -> Result<Option<NodeState>>;
    /// Create a pending row if none exists. Returns `true` if created.
    fn insert_pending(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        remaining: u32,
    ) -> Result<bool>;
    /// Decrement a pending counter that is above zero and return the new
    /// value. `None` if the row is missing, resolved or already at zero.
    fn decrement(&mut self, canonical: CanonicalIndex, player: Player) -> Result<Option<u32>>;
    /// Mark a row resolved unless it already is. Returns `true` if this call
    /// resolved it.
    fn resolve(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        outcome: Outcome,
        depth: u32,
    ) -> Result<bool>;

    fn push(&mut self, item: QueueItem) -> Result<()>;
    /// Remove and return the oldest entry.
    fn pop(&mut self) -> Result<Option<QueueItem>>;

    /// Resolved rows strictly after `after` in (canonical, player) order.
    fn solved_after(
        &self,
        after: Option<(CanonicalIndex, Player)>,
        limit: usize,
    ) -> Result<Vec<SolvedState>>;

    fn counts(&self) -> Result<StoreCounts>;
}

/// Compare the store's catalog binding against `catalog` without writing.
///
/// Returns whether the store is bound at all. An unbound store passes.
pub fn check_catalog<S: Store + ?Sized>(store: &S, catalog: &Catalog) -> Result<bool> {
    let radix = catalog.radix().get();
    let fingerprint = catalog.fingerprint();

    match (store.meta(META_RADIX)?, store.meta(META_FINGERPRINT)?) {
        (None, None) => Ok(false),
        (Some(r), Some(f)) => {
            let stored_radix = parse_meta(META_RADIX, &r)?;
            let stored_fingerprint = parse_meta(META_FINGERPRINT, &f)?;
            if stored_radix != radix || stored_fingerprint != fingerprint {
                return Err(SolverError::CatalogMismatch {
                    stored_radix,
                    stored_fingerprint,
                    radix,
                    fingerprint,
                });
            }
            Ok(true)
        }
        _ => Err(SolverError::Corrupt("catalog binding is incomplete".into())),
    }
}

/// Record the catalog in a fresh store, or check it against an existing one.
pub fn bind_catalog<S: Store + ?Sized>(store: &mut S, catalog: &Catalog) -> Result<()> {
    if check_catalog(&*store, catalog)? {
        return Ok(());
    }
    let radix = catalog.radix().get();
    let fingerprint = catalog.fingerprint();
    store.begin()?;
    store.set_meta(META_RADIX, &radix.to_string())?;
    store.set_meta(META_FINGERPRINT, &fingerprint.to_string())?;
    store.commit()?;
    tracing::debug!(radix, fingerprint, "bound catalog to new store");
    Ok(())
}

/// Parse a numeric meta value.
pub fn parse_meta(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| SolverError::Corrupt(format!("meta {} holds {:?}", key, value)))
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

/// SQLite-backed store in WAL mode.
pub struct SqliteStore {
    conn: Connection,
    in_tx: bool,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<SqliteStore> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<SqliteStore> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<SqliteStore> {
        // In-memory databases answer "memory"; that is fine.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(journal_mode = %mode, "store opened");
        Ok(SqliteStore { conn, in_tx: false })
    }
}

fn player_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Player> {
    let bits: i64 = row.get(idx)?;
    u8::try_from(bits)
        .ok()
        .and_then(Player::from_bits)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, bits))
}

fn node_state_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NodeState> {
    let value: i64 = row.get(idx)?;
    let depth: i64 = row.get(idx + 1)?;
    let remaining: i64 = row.get(idx + 2)?;
    match value {
        0 => Ok(NodeState::Pending {
            remaining: remaining as u32,
        }),
        v => Outcome::from_value(v as i8)
            .map(|outcome| NodeState::Resolved {
                outcome,
                depth: depth as u32,
            })
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, v)),
    }
}

impl Store for SqliteStore {
    fn begin(&mut self) -> Result<()> {
        if !self.in_tx {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
            self.in_tx = true;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_tx {
            self.conn.execute_batch("COMMIT")?;
            self.in_tx = false;
        }
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn set_meta(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn insert_terminal(&mut self, canonical: CanonicalIndex, winner: Player) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO terminals (canonical, winner) VALUES (?1, ?2)")?;
        Ok(stmt.execute(params![canonical as i64, winner as u8 as i64])? > 0)
    }

    fn terminal(&self, canonical: CanonicalIndex) -> Result<Option<Player>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT winner FROM terminals WHERE canonical = ?1")?;
        Ok(stmt
            .query_row(params![canonical as i64], |row| player_at(row, 0))
            .optional()?)
    }

    fn terminals_after(
        &self,
        after: Option<CanonicalIndex>,
        limit: usize,
    ) -> Result<Vec<(CanonicalIndex, Player)>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT canonical, winner FROM terminals WHERE canonical > ?1 ORDER BY canonical LIMIT ?2",
        )?;
        let after = after.map_or(-1, |c| c as i64);
        let rows = stmt.query_map(params![after, limit as i64], |row| {
            Ok((row.get::<_, i64>(0)? as u64, player_at(row, 1)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_move(&mut self, record: MoveRecord) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO moves (from_canonical, from_player, to_canonical, to_player)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        stmt.execute(params![
            record.from as i64,
            record.from_player as u8 as i64,
            record.to as i64,
            record.to_player as u8 as i64,
        ])?;
        Ok(())
    }

    fn moves_from(&self, canonical: CanonicalIndex, player: Player) -> Result<Vec<MoveRecord>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT to_canonical, to_player FROM moves
             WHERE from_canonical = ?1 AND from_player = ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![canonical as i64, player as u8 as i64], |row| {
            Ok(MoveRecord {
                from: canonical,
                from_player: player,
                to: row.get::<_, i64>(0)? as u64,
                to_player: player_at(row, 1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn set_outdegree(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        count: u32,
    ) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR REPLACE INTO outdegree (canonical, player, count) VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![canonical as i64, player as u8 as i64, count as i64])?;
        Ok(())
    }

    fn outdegree(&self, canonical: CanonicalIndex, player: Player) -> Result<Option<u32>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT count FROM outdegree WHERE canonical = ?1 AND player = ?2")?;
        Ok(stmt
            .query_row(params![canonical as i64, player as u8 as i64], |row| {
                row.get::<_, i64>(0).map(|c| c as u32)
            })
            .optional()?)
    }

    fn state(&self, canonical: CanonicalIndex, player: Player) -> Result<Option<NodeState>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT value, depth, remaining FROM states WHERE canon = ?1 AND player = ?2",
        )?;
        Ok(stmt
            .query_row(params![canonical as i64, player as u8 as i64], |row| {
                node_state_at(row, 0)
            })
            .optional()?)
    }

    fn insert_pending(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        remaining: u32,
    ) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT OR IGNORE INTO states (canon, player, value, depth, remaining)
             VALUES (?1, ?2, 0, -1, ?3)",
        )?;
        Ok(stmt.execute(params![canonical as i64, player as u8 as i64, remaining as i64])? > 0)
    }

    fn decrement(&mut self, canonical: CanonicalIndex, player: Player) -> Result<Option<u32>> {
        let mut stmt = self.conn.prepare_cached(
            "UPDATE states SET remaining = remaining - 1
             WHERE canon = ?1 AND player = ?2 AND value = 0 AND remaining > 0
             RETURNING remaining",
        )?;
        Ok(stmt
            .query_row(params![canonical as i64, player as u8 as i64], |row| {
                row.get::<_, i64>(0).map(|r| r as u32)
            })
            .optional()?)
    }

    fn resolve(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        outcome: Outcome,
        depth: u32,
    ) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO states (canon, player, value, depth, remaining)
             VALUES (?1, ?2, ?3, ?4, 0)
             ON CONFLICT (canon, player) DO UPDATE
             SET value = excluded.value, depth = excluded.depth, remaining = 0
             WHERE states.value = 0",
        )?;
        let changed = stmt.execute(params![
            canonical as i64,
            player as u8 as i64,
            outcome.value() as i64,
            depth as i64,
        ])?;
        Ok(changed > 0)
    }

    fn push(&mut self, item: QueueItem) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO queue (canon, player, depth) VALUES (?1, ?2, ?3)")?;
        stmt.execute(params![
            item.canonical as i64,
            item.player as u8 as i64,
            item.depth as i64,
        ])?;
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<QueueItem>> {
        let head = {
            let mut stmt = self
                .conn
                .prepare_cached("SELECT id, canon, player, depth FROM queue ORDER BY id LIMIT 1")?;
            stmt.query_row([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    QueueItem {
                        canonical: row.get::<_, i64>(1)? as u64,
                        player: player_at(row, 2)?,
                        depth: row.get::<_, i64>(3)? as u32,
                    },
                ))
            })
            .optional()?
        };
        let Some((id, item)) = head else {
            return Ok(None);
        };
        let mut stmt = self.conn.prepare_cached("DELETE FROM queue WHERE id = ?1")?;
        stmt.execute(params![id])?;
        Ok(Some(item))
    }

    fn solved_after(
        &self,
        after: Option<(CanonicalIndex, Player)>,
        limit: usize,
    ) -> Result<Vec<SolvedState>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT canon, player, value, depth, remaining FROM states
             WHERE value != 0 AND (canon > ?1 OR (canon = ?1 AND player > ?2))
             ORDER BY canon, player LIMIT ?3",
        )?;
        let (canon, player) = after.map_or((-1, 0), |(c, p)| (c as i64, p as u8 as i64));
        let rows = stmt.query_map(params![canon, player, limit as i64], |row| {
            let canonical = row.get::<_, i64>(0)? as u64;
            let player = player_at(row, 1)?;
            let value: i64 = row.get(2)?;
            let outcome =
                Outcome::from_value(value as i8).ok_or(rusqlite::Error::IntegralValueOutOfRange(2, value))?;
            Ok(SolvedState {
                canonical,
                player,
                outcome,
                depth: row.get::<_, i64>(3)? as u32,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn counts(&self) -> Result<StoreCounts> {
        let count = |sql: &str| -> Result<u64> {
            Ok(self.conn.query_row(sql, [], |row| row.get::<_, i64>(0))? as u64)
        };
        let max_depth: Option<i64> = self.conn.query_row(
            "SELECT MAX(depth) FROM states WHERE value != 0",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreCounts {
            terminals: count("SELECT COUNT(*) FROM terminals")?,
            p1_terminals: count("SELECT COUNT(*) FROM terminals WHERE winner = 1")?,
            p2_terminals: count("SELECT COUNT(*) FROM terminals WHERE winner = 2")?,
            moves: count("SELECT COUNT(*) FROM moves")?,
            outdegrees: count("SELECT COUNT(*) FROM outdegree")?,
            pending: count("SELECT COUNT(*) FROM states WHERE value = 0")?,
            wins: count("SELECT COUNT(*) FROM states WHERE value = 1")?,
            losses: count("SELECT COUNT(*) FROM states WHERE value = -1")?,
            queued: count("SELECT COUNT(*) FROM queue")?,
            max_depth: max_depth.map(|d| d as u32),
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Map-backed store. Transactions are no-ops; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    meta: HashMap<String, String>,
    terminals: BTreeMap<CanonicalIndex, Player>,
    moves: Vec<MoveRecord>,
    outdegree: HashMap<(CanonicalIndex, Player), u32>,
    states: BTreeMap<(CanonicalIndex, Player), NodeState>,
    queue: VecDeque<QueueItem>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl Store for MemoryStore {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.meta.get(key).cloned())
    }

    fn set_meta(&mut self, key: &str, value: &str) -> Result<()> {
        self.meta.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn insert_terminal(&mut self, canonical: CanonicalIndex, winner: Player) -> Result<bool> {
        if self.terminals.contains_key(&canonical) {
            return Ok(false);
        }
        self.terminals.insert(canonical, winner);
        Ok(true)
    }

    fn terminal(&self, canonical: CanonicalIndex) -> Result<Option<Player>> {
        Ok(self.terminals.get(&canonical).copied())
    }

    fn terminals_after(
        &self,
        after: Option<CanonicalIndex>,
        limit: usize,
    ) -> Result<Vec<(CanonicalIndex, Player)>> {
        let rows = match after {
            Some(c) => self.terminals.range(c + 1..),
            None => self.terminals.range(..),
        };
        Ok(rows.take(limit).map(|(&c, &w)| (c, w)).collect())
    }

    fn insert_move(&mut self, record: MoveRecord) -> Result<()> {
        self.moves.push(record);
        Ok(())
    }

    fn moves_from(&self, canonical: CanonicalIndex, player: Player) -> Result<Vec<MoveRecord>> {
        Ok(self
            .moves
            .iter()
            .filter(|m| m.from == canonical && m.from_player == player)
            .copied()
            .collect())
    }

    fn set_outdegree(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        count: u32,
    ) -> Result<()> {
        self.outdegree.insert((canonical, player), count);
        Ok(())
    }

    fn outdegree(&self, canonical: CanonicalIndex, player: Player) -> Result<Option<u32>> {
        Ok(self.outdegree.get(&(canonical, player)).copied())
    }

    fn state(&self, canonical: CanonicalIndex, player: Player) -> Result<Option<NodeState>> {
        Ok(self.states.get(&(canonical, player)).copied())
    }

    fn insert_pending(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        remaining: u32,
    ) -> Result<bool> {
        if self.states.contains_key(&(canonical, player)) {
            return Ok(false);
        }
        self.states
            .insert((canonical, player), NodeState::Pending { remaining });
        Ok(true)
    }

    fn decrement(&mut self, canonical: CanonicalIndex, player: Player) -> Result<Option<u32>> {
        match self.states.get_mut(&(canonical, player)) {
            Some(NodeState::Pending { remaining }) if *remaining > 0 => {
                *remaining -= 1;
                Ok(Some(*remaining))
            }
            _ => Ok(None),
        }
    }

    fn resolve(
        &mut self,
        canonical: CanonicalIndex,
        player: Player,
        outcome: Outcome,
        depth: u32,
    ) -> Result<bool> {
        let entry = self
            .states
            .entry((canonical, player))
            .or_insert(NodeState::Pending { remaining: 0 });
        if entry.is_resolved() {
            return Ok(false);
        }
        *entry = NodeState::Resolved { outcome, depth };
        Ok(true)
    }

    fn push(&mut self, item: QueueItem) -> Result<()> {
        self.queue.push_back(item);
        Ok(())
    }

    fn pop(&mut self) -> Result<Option<QueueItem>> {
        Ok(self.queue.pop_front())
    }

    fn solved_after(
        &self,
        after: Option<(CanonicalIndex, Player)>,
        limit: usize,
    ) -> Result<Vec<SolvedState>> {
        use std::ops::Bound;
        let lower = match after {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        Ok(self
            .states
            .range((lower, Bound::Unbounded))
            .filter_map(|(&(canonical, player), state)| match *state {
                NodeState::Resolved { outcome, depth } => Some(SolvedState {
                    canonical,
                    player,
                    outcome,
                    depth,
                }),
                NodeState::Pending { .. } => None,
            })
            .take(limit)
            .collect())
    }

    fn counts(&self) -> Result<StoreCounts> {
        let mut counts = StoreCounts {
            terminals: self.terminals.len() as u64,
            moves: self.moves.len() as u64,
            outdegrees: self.outdegree.len() as u64,
            queued: self.queue.len() as u64,
            ..StoreCounts::default()
        };
        for winner in self.terminals.values() {
            match winner {
                Player::One => counts.p1_terminals += 1,
                Player::Two => counts.p2_terminals += 1,
            }
        }
        for state in self.states.values() {
            match *state {
                NodeState::Pending { .. } => counts.pending += 1,
                NodeState::Resolved { outcome, depth } => {
                    match outcome {
                        Outcome::Win => counts.wins += 1,
                        Outcome::Loss => counts.losses += 1,
                    }
                    counts.max_depth = Some(counts.max_depth.map_or(depth, |d| d.max(depth)));
                }
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shared checks: both engines must agree on every contract.
    fn exercise<S: Store>(store: &mut S) {
        store.begin().unwrap();

        assert!(store.insert_terminal(42, Player::One).unwrap());
        assert!(!store.insert_terminal(42, Player::Two).unwrap());
        assert_eq!(store.terminal(42).unwrap(), Some(Player::One));
        store.insert_terminal(7, Player::Two).unwrap();
        store.insert_terminal(100, Player::Two).unwrap();
        assert_eq!(
            store.terminals_after(None, 2).unwrap(),
            vec![(7, Player::Two), (42, Player::One)]
        );
        assert_eq!(store.terminals_after(Some(42), 10).unwrap(), vec![(100, Player::Two)]);

        // Pending rows count down and stop at zero.
        assert!(store.insert_pending(5, Player::One, 2).unwrap());
        assert!(!store.insert_pending(5, Player::One, 9).unwrap());
        assert_eq!(store.decrement(5, Player::One).unwrap(), Some(1));
        assert_eq!(store.decrement(5, Player::One).unwrap(), Some(0));
        assert_eq!(store.decrement(5, Player::One).unwrap(), None);
        assert_eq!(store.decrement(6, Player::One).unwrap(), None);

        // Resolution happens once; later attempts leave the row alone.
        assert!(store.resolve(5, Player::One, Outcome::Loss, 3).unwrap());
        assert!(!store.resolve(5, Player::One, Outcome::Win, 1).unwrap());
        assert_eq!(
            store.state(5, Player::One).unwrap(),
            Some(NodeState::Resolved { outcome: Outcome::Loss, depth: 3 })
        );
        assert!(store.resolve(9, Player::Two, Outcome::Win, 1).unwrap());
        assert_eq!(store.decrement(9, Player::Two).unwrap(), None);
        assert_eq!(store.state(5, Player::Two).unwrap(), None);

        // FIFO queue.
        for depth in 0..3 {
            store
                .push(QueueItem { canonical: 10 - depth as u64, player: Player::Two, depth })
                .unwrap();
        }
        assert_eq!(store.pop().unwrap().map(|i| i.depth), Some(0));
        assert_eq!(store.pop().unwrap().map(|i| i.depth), Some(1));
        assert_eq!(store.pop().unwrap().map(|i| i.canonical), Some(8));
        assert_eq!(store.pop().unwrap(), None);

        let solved = store.solved_after(None, 10).unwrap();
        assert_eq!(
            solved.iter().map(|s| (s.canonical, s.player)).collect::<Vec<_>>(),
            vec![(5, Player::One), (9, Player::Two)]
        );
        assert_eq!(store.solved_after(Some((5, Player::One)), 10).unwrap().len(), 1);

        store
            .insert_move(MoveRecord { from: 1, from_player: Player::One, to: 2, to_player: Player::Two })
            .unwrap();
        store.set_outdegree(1, Player::One, 1).unwrap();
        store.set_outdegree(1, Player::One, 4).unwrap();
        assert_eq!(store.outdegree(1, Player::One).unwrap(), Some(4));
        assert_eq!(store.moves_from(1, Player::One).unwrap().len(), 1);
        assert!(store.moves_from(1, Player::Two).unwrap().is_empty());

        store.set_meta("k", "v").unwrap();
        assert_eq!(store.meta("k").unwrap().as_deref(), Some("v"));
        assert_eq!(store.meta("missing").unwrap(), None);

        store.commit().unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.terminals, 3);
        assert_eq!(counts.p1_terminals, 1);
        assert_eq!(counts.p2_terminals, 2);
        assert_eq!(counts.wins, 1);
        assert_eq!(counts.losses, 1);
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.queued, 0);
        assert_eq!(counts.moves, 1);
        assert_eq!(counts.outdegrees, 1);
        assert_eq!(counts.max_depth, Some(3));
    }

    #[test]
    fn test_memory_store_contract() {
        exercise(&mut MemoryStore::new());
    }

    #[test]
    fn test_sqlite_store_contract() {
        exercise(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_bind_catalog() {
        let small = Catalog::build(2, Some(50)).unwrap();
        let other = Catalog::build(2, Some(60)).unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();
        bind_catalog(&mut store, &small).unwrap();
        bind_catalog(&mut store, &small).unwrap();
        assert!(matches!(
            bind_catalog(&mut store, &other),
            Err(SolverError::CatalogMismatch { stored_radix: 50, radix: 60, .. })
        ));
    }

    #[test]
    fn test_check_catalog_is_read_only() {
        let small = Catalog::build(2, Some(50)).unwrap();
        let other = Catalog::build(2, Some(60)).unwrap();
        let mut store = SqliteStore::open_in_memory().unwrap();

        assert!(!check_catalog(&store, &small).unwrap());
        assert_eq!(store.meta(META_RADIX).unwrap(), None);
        assert_eq!(store.meta(META_FINGERPRINT).unwrap(), None);

        bind_catalog(&mut store, &small).unwrap();
        assert!(check_catalog(&store, &small).unwrap());
        assert!(matches!(
            check_catalog(&store, &other),
            Err(SolverError::CatalogMismatch { stored_radix: 50, radix: 60, .. })
        ));
        // Same radix, different layers.
        let narrow = Catalog::build(1, Some(50)).unwrap();
        assert!(matches!(
            check_catalog(&store, &narrow),
            Err(SolverError::CatalogMismatch { stored_radix: 50, radix: 50, .. })
        ));

        let mut partial = MemoryStore::new();
        partial.set_meta(META_RADIX, "50").unwrap();
        assert!(matches!(check_catalog(&partial, &small), Err(SolverError::Corrupt(_))));
    }

    #[test]
    fn test_sqlite_persists_across_reopen() {
        let path = std::env::temp_dir().join("cover_store_reopen.db");
        let _ = std::fs::remove_file(&path);
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.begin().unwrap();
            store.insert_terminal(11, Player::Two).unwrap();
            store.push(QueueItem { canonical: 11, player: Player::One, depth: 0 }).unwrap();
            store.commit().unwrap();
            // Uncommitted writes are lost when the connection goes away.
            store.begin().unwrap();
            store.insert_terminal(12, Player::One).unwrap();
        }
        let mut store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.terminal(11).unwrap(), Some(Player::Two));
        assert_eq!(store.terminal(12).unwrap(), None);
        assert_eq!(
            store.pop().unwrap(),
            Some(QueueItem { canonical: 11, player: Player::One, depth: 0 })
        );
        drop(store);
        let _ = std::fs::remove_file(&path);
    }
}
