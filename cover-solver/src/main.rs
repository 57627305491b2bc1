//! `retro`: scan, build moves, solve, export and summarize a cover-move
//! tablebase.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use cover_solver::config::{DEFAULT_BATCH, LOG_INTERVAL_SECS};
use cover_solver::moves::build_moves;
use cover_solver::scanner::scan;
use cover_solver::solver::{META_RULE, META_SEED};
use cover_solver::store::{bind_catalog, META_FINGERPRINT, META_RADIX};
use cover_solver::{
    MovesConfig, Rule, RunConfig, Scale, ScanConfig, SolveConfig, Solver, SqliteStore, Store,
    StoreCounts, Tablebase,
};

#[derive(Parser, Debug)]
#[command(name = "retro")]
#[command(about = "Retrograde solver for placement-only Gobblet Gobblers", long_about = None)]
struct Cli {
    /// SQLite database holding all stage state
    #[arg(long, global = true, default_value = "data/cover.db")]
    db: PathBuf,

    /// Use the 50-layer test catalog
    #[arg(long, global = true)]
    test_small: bool,

    /// Use the first N catalog layers
    #[arg(long, global = true)]
    radix: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record every won board in a slice of outer (large-layer) indices
    Scan {
        #[arg(long, default_value_t = 0)]
        a_start: usize,
        /// Defaults to the radix
        #[arg(long)]
        a_end: Option<usize>,
        #[arg(long, default_value_t = DEFAULT_BATCH)]
        batch: usize,
    },
    /// Materialize the moves and outdegree tables for a board index range
    Moves {
        #[arg(long, default_value_t = 0)]
        start: u64,
        /// Defaults to radix^3
        #[arg(long)]
        end: Option<u64>,
        #[arg(long, default_value_t = DEFAULT_BATCH)]
        batch: usize,
    },
    /// Seed from terminals and propagate outcomes backward
    Solve {
        #[arg(long, value_enum, default_value_t = Rule::Standard)]
        rule: Rule,
        #[arg(long, default_value_t = DEFAULT_BATCH)]
        batch: usize,
    },
    /// Write solved states to a binary tablebase
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Print table counts
    Summary {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct Summary {
    radix: Option<String>,
    catalog_fingerprint: Option<String>,
    rule: Option<String>,
    seeded: bool,
    counts: StoreCounts,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let run = RunConfig {
        scale: Scale::from_flags(cli.test_small, cli.radix)?,
        db_path: cli.db,
    };

    // Set up SIGINT handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, finishing current batch");
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl-C handler")?;

    if let Some(parent) = run.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }

    let catalog = run.scale.catalog()?;
    let radix = catalog.radix();
    let mut store = SqliteStore::open(&run.db_path)
        .with_context(|| format!("opening {}", run.db_path.display()))?;
    tracing::info!(db = %run.db_path.display(), radix = radix.get(), "store ready");

    match cli.command {
        Command::Scan { a_start, a_end, batch } => {
            let config = ScanConfig {
                a_start,
                a_end: a_end.unwrap_or(radix.get() as usize),
                batch,
            };
            let report = scan(&catalog, &mut store, &config, &running)?;
            println!(
                "scan {}..{}: {} won boards, {} new terminals{}",
                config.a_start,
                config.a_end,
                report.found,
                report.inserted,
                if report.complete { "" } else { " (interrupted)" }
            );
        }
        Command::Moves { start, end, batch } => {
            let config = MovesConfig {
                start,
                end: end.unwrap_or(radix.space()),
                batch,
            };
            let report = build_moves(&catalog, &mut store, &config, &running)?;
            println!(
                "moves {}..{}: {} boards, {} moves{}",
                config.start,
                config.end,
                report.boards,
                report.moves,
                if report.complete { "" } else { " (interrupted)" }
            );
        }
        Command::Solve { rule, batch } => {
            let config = SolveConfig {
                rule,
                batch,
                log_interval_secs: LOG_INTERVAL_SECS,
            };
            let mut solver = Solver::new(&catalog, &mut store, config)?;
            let report = solver.solve(&running)?;
            println!(
                "solve ({}): seeded={} processed={} wins={} losses={} max_depth={}{}",
                rule.as_str(),
                report.seeded,
                report.processed,
                report.wins,
                report.losses,
                report.max_depth,
                if report.complete { "" } else { " (interrupted)" }
            );
        }
        Command::Export { out } => {
            bind_catalog(&mut store, &catalog)?;
            let count = Tablebase::export(&store, radix.get() as u32, &out)?;
            println!("exported {} states to {}", count, out.display());
        }
        Command::Summary { json } => {
            let summary = Summary {
                radix: store.meta(META_RADIX)?,
                catalog_fingerprint: store.meta(META_FINGERPRINT)?,
                rule: store.meta(META_RULE)?,
                seeded: store.meta(META_SEED)?.as_deref() == Some("done"),
                counts: store.counts()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
        }
    }

    Ok(())
}

fn print_summary(s: &Summary) {
    let c = &s.counts;
    println!("radix:        {}", s.radix.as_deref().unwrap_or("-"));
    println!("fingerprint:  {}", s.catalog_fingerprint.as_deref().unwrap_or("-"));
    println!("rule:         {}", s.rule.as_deref().unwrap_or("-"));
    println!("seeded:       {}", s.seeded);
    println!("terminals:    {} (p1={} p2={})", c.terminals, c.p1_terminals, c.p2_terminals);
    println!("moves:        {} (outdegree rows={})", c.moves, c.outdegrees);
    println!("states:       win={} loss={} pending={}", c.wins, c.losses, c.pending);
    println!("queued:       {}", c.queued);
    match c.max_depth {
        Some(d) => println!("max depth:    {}", d),
        None => println!("max depth:    -"),
    }
}
