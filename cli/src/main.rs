//! marketindex CLI — inspect indexer state.
//!
//! Usage:
//! ```bash
//! marketindex status ./marketindex.db
//! marketindex info
//! ```

use std::env;
use std::process;

use anyhow::Context;

use marketindex_core::{IndexerConfig, SlotClock};
use marketindex_store::MarketStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    match args[1].as_str() {
        "info" => cmd_info(),
        "status" => {
            let db_path = args.get(2).map(String::as_str).unwrap_or("./marketindex.db");
            cmd_status(db_path).await?;
        }
        "version" | "--version" | "-V" => {
            println!("marketindex {}", env!("CARGO_PKG_VERSION"));
        }
        "help" | "--help" | "-h" => print_usage(),
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    }
    Ok(())
}

fn print_usage() {
    println!("marketindex {}", env!("CARGO_PKG_VERSION"));
    println!("Reorg-aware marketplace activity indexer\n");
    println!("USAGE:");
    println!("    marketindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    status [db-path]  Show checkpoint pointers and recent activity");
    println!("    info              Show Marketindex configuration defaults");
    println!("    version           Print version");
    println!("    help              Print this help");
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("Marketindex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default database: {}", defaults.db_path);
    println!(
        "  Default confirmation depth: {} slots (~100 blocks)",
        defaults.confirmation_depth
    );
    println!(
        "  Default cleanup margin: {} slots (~30 min)",
        defaults.cleanup_margin
    );
    println!("  Default feed path: {}", defaults.feed.path.display());
    println!("  Default feed bound: {} events", defaults.feed.max_events);
}

async fn cmd_status(db_path: &str) -> anyhow::Result<()> {
    let store = MarketStore::open(db_path, None)
        .await
        .with_context(|| format!("opening store at {db_path}"))?;
    let checkpoint = store.checkpoint().await.context("reading checkpoint")?;
    let pending = store.pending_count().await.context("counting pending events")?;
    let activity = store.recent_activity().await.context("reading activity")?;

    let clock = SlotClock::mainnet();
    match clock.datetime(checkpoint.sync_point.slot) {
        Some(time) if !checkpoint.sync_point.is_origin() => {
            println!("sync point:    {} ({time})", checkpoint.sync_point);
        }
        _ => println!("sync point:    {}", checkpoint.sync_point),
    }
    println!("cleanup point: {}", checkpoint.cleanup_point);
    println!("pending events: {pending}");
    println!("recent activity: {} rows", activity.len());
    for row in activity.iter().take(10) {
        println!(
            "  slot {:>9}  {:<20} {:>12} lovelace  {}",
            row.slot,
            row.kind,
            row.lovelace,
            &row.tx_hash[..row.tx_hash.len().min(16)]
        );
    }
    Ok(())
}
