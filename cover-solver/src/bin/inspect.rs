//! Decode a board index and show what is known about it.
//!
//! Usage: inspect <index> [--db data/cover.db] [--tablebase out.bin] [--test-small | --radix N]

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use cover_core::{canonicalize, distinct_successors, outdegree, Board, Player, Size};
use cover_solver::store::check_catalog;
use cover_solver::{Scale, SqliteStore, Store, Tablebase};

#[derive(Parser, Debug)]
#[command(name = "inspect")]
#[command(about = "Decode a board index and print its layers, verdicts and moves", long_about = None)]
struct Args {
    /// Board index (need not be canonical)
    index: u64,

    /// Store to read terminals and solver states from
    #[arg(long)]
    db: Option<PathBuf>,

    /// Exported tablebase to look the position up in
    #[arg(long)]
    tablebase: Option<PathBuf>,

    #[arg(long)]
    test_small: bool,

    #[arg(long)]
    radix: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let catalog = Scale::from_flags(args.test_small, args.radix)?.catalog()?;

    let board = Board::decode(&catalog, args.index)?;
    let canonical = canonicalize(&catalog, args.index)?;

    println!("index:     {}", args.index);
    println!("canonical: {}{}", canonical, if canonical == args.index { " (self)" } else { "" });
    println!();
    println!("stacks (L M S per cell):");
    print!("{}", board);
    println!();
    for size in Size::LARGEST_FIRST {
        println!("{} layer: {:?}", size.letter(), board.layer(size).cells());
    }
    println!();
    println!("top view:");
    print!("{}", board.top_view());
    println!("winner:    {:?}", board.winner());

    for player in Player::BOTH {
        println!(
            "{:?} to move: {} cover moves, {} distinct successors",
            player,
            outdegree(&catalog, &board, player),
            distinct_successors(&catalog, &board, player)?.len(),
        );
    }

    if let Some(path) = &args.db {
        if !path.exists() {
            bail!("no store at {}", path.display());
        }
        let store = SqliteStore::open(path)?;
        // Verdicts keyed under another catalog belong to other boards.
        if !check_catalog(&store, &catalog)? {
            bail!("store {} has no catalog binding", path.display());
        }
        println!();
        match store.terminal(canonical)? {
            Some(winner) => println!("terminal:  won by {:?}", winner),
            None => println!("terminal:  no"),
        }
        for player in Player::BOTH {
            match store.state(canonical, player)? {
                Some(state) => println!(
                    "state {:?}: value={} depth={}",
                    player,
                    state.value(),
                    state.depth()
                ),
                None => println!("state {:?}: unseen", player),
            }
        }
    }

    if let Some(path) = &args.tablebase {
        let tb = Tablebase::load(path)?;
        if tb.radix() as u64 != catalog.radix().get() {
            bail!(
                "tablebase radix {} does not match catalog radix {}",
                tb.radix(),
                catalog.radix()
            );
        }
        println!();
        for player in Player::BOTH {
            match tb.lookup(canonical, player) {
                Some(e) => println!("tablebase {:?}: {:?} in {}", player, e.outcome, e.depth),
                None => println!("tablebase {:?}: not solved", player),
            }
        }
    }

    Ok(())
}
