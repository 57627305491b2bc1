//! Run configuration and validation.
//!
//! Everything here is checked before a stage touches the store.

use std::path::PathBuf;

use cover_core::{Catalog, Radix, FULL_CATALOG_LEN, PIECES_PER_SIZE};

use crate::error::{Result, SolverError};
use crate::solver::Rule;

/// Catalog size for quick runs.
pub const RADIX_TEST: usize = 50;

/// Rows (or queue items) per committed transaction.
pub const DEFAULT_BATCH: usize = 200_000;

/// Seconds between progress lines.
pub const LOG_INTERVAL_SECS: u64 = 5;

/// Which catalog a run uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scale {
    /// All 1423 layers.
    Full,
    /// The first `n` layers in generation order.
    Reduced(usize),
}

impl Scale {
    /// Resolve the global `--test-small` / `--radix` flags.
    pub fn from_flags(test_small: bool, radix: Option<usize>) -> Result<Scale> {
        match (test_small, radix) {
            (true, Some(_)) => Err(SolverError::Config(
                "--test-small and --radix are mutually exclusive".into(),
            )),
            (true, None) => Ok(Scale::Reduced(RADIX_TEST)),
            (false, Some(0)) => Err(SolverError::Config("radix must be positive".into())),
            (false, Some(n)) if n >= FULL_CATALOG_LEN => Ok(Scale::Full),
            (false, Some(n)) => Ok(Scale::Reduced(n)),
            (false, None) => Ok(Scale::Full),
        }
    }

    pub fn catalog(self) -> Result<Catalog> {
        match self {
            Scale::Full => Ok(Catalog::full()),
            Scale::Reduced(n) => Ok(Catalog::build(PIECES_PER_SIZE, Some(n))?),
        }
    }
}

/// Settings shared by every subcommand.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub scale: Scale,
    pub db_path: PathBuf,
}

/// One slice of the terminal scan: outer (large) layer indices
/// `a_start..a_end`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    pub a_start: usize,
    pub a_end: usize,
    pub batch: usize,
}

impl ScanConfig {
    /// The whole board space.
    pub fn full(radix: Radix, batch: usize) -> ScanConfig {
        ScanConfig {
            a_start: 0,
            a_end: radix.get() as usize,
            batch,
        }
    }

    pub fn validate(&self, radix: Radix) -> Result<()> {
        check_batch(self.batch)?;
        if self.a_start >= self.a_end {
            return Err(SolverError::Config(format!(
                "empty scan slice {}..{}",
                self.a_start, self.a_end
            )));
        }
        if self.a_end as u64 > radix.get() {
            return Err(SolverError::Config(format!(
                "scan slice end {} exceeds radix {}",
                self.a_end, radix
            )));
        }
        Ok(())
    }

    /// Meta key holding this slice's resume point.
    pub fn cursor_key(&self) -> String {
        format!("scan:{}:{}", self.a_start, self.a_end)
    }
}

/// A range of board indices for the move-table builder.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MovesConfig {
    pub start: u64,
    pub end: u64,
    pub batch: usize,
}

impl MovesConfig {
    pub fn full(radix: Radix, batch: usize) -> MovesConfig {
        MovesConfig {
            start: 0,
            end: radix.space(),
            batch,
        }
    }

    pub fn validate(&self, radix: Radix) -> Result<()> {
        check_batch(self.batch)?;
        if self.start >= self.end {
            return Err(SolverError::Config(format!(
                "empty index range {}..{}",
                self.start, self.end
            )));
        }
        if self.end > radix.space() {
            return Err(SolverError::Config(format!(
                "index range end {} exceeds board space {}",
                self.end,
                radix.space()
            )));
        }
        Ok(())
    }

    pub fn cursor_key(&self) -> String {
        format!("moves:{}:{}", self.start, self.end)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolveConfig {
    pub rule: Rule,
    /// Queue items per transaction.
    pub batch: usize,
    pub log_interval_secs: u64,
}

impl Default for SolveConfig {
    fn default() -> Self {
        SolveConfig {
            rule: Rule::default(),
            batch: DEFAULT_BATCH,
            log_interval_secs: LOG_INTERVAL_SECS,
        }
    }
}

impl SolveConfig {
    pub fn validate(&self) -> Result<()> {
        check_batch(self.batch)
    }
}

fn check_batch(batch: usize) -> Result<()> {
    if batch == 0 {
        return Err(SolverError::Config("batch size must be positive".into()));
    }
    Ok(())
}
