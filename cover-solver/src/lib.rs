//! Retrograde analysis of placement-only Gobblet Gobblers.
//!
//! The pipeline has three stages over one store:
//!
//! 1. [`scanner::scan`] records every won board (by canonical index).
//! 2. [`moves::build_moves`] optionally materializes the move graph.
//! 3. [`solver::Solver`] propagates wins and losses backward from the
//!    terminals.
//!
//! Each stage commits in batches and resumes from its stored cursor, so any
//! of them can be interrupted and rerun. [`tablebase::Tablebase`] dumps the
//! solved states to a checksummed binary file.

pub mod config;
pub mod error;
pub mod moves;
pub mod scanner;
pub mod solver;
pub mod stats;
pub mod store;
pub mod tablebase;

pub use config::{MovesConfig, RunConfig, Scale, ScanConfig, SolveConfig};
pub use error::{Result, SolverError};
pub use solver::{Rule, SolveReport, Solver};
pub use store::{MemoryStore, NodeState, Outcome, SqliteStore, Store, StoreCounts};
pub use tablebase::Tablebase;
