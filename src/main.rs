//! codemeta - link in-code comment markers to externally stored annotation fragments
//!
//! codemeta provides:
//! - Marker recognition across comment styles (`//`, `#`, `<!--`, `/*`)
//! - Sequential ID allocation with durable state
//! - A fragment store with a small header format and cached reference counts
//! - Full-workspace reference scans, summaries and legacy marker upgrades
//! - Unified output format (jsonl/json/md/raw)

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

mod cli;
mod core;
mod decorations;
mod ids;
mod index;
mod markers;
mod store;
mod summary;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Warn
    };
    let mut logger = env_logger::Builder::new();
    logger.filter_level(level).format_timestamp(None);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    cli::run(cli)
}
