//! feedwire CLI: audit news sources for feeds and ingest their articles.
//!
//! `audit` classifies every source in a CSV list by feed availability and
//! reachability; `ingest` polls the feed-bearing sources and stores new
//! articles in a local libSQL database.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
