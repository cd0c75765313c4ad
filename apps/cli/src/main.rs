//! pagebot CLI: producer-page maintenance bot for a MediaWiki site.
//!
//! Adds song and album pages filed under a producer's categories to the
//! works tables of the producer's page, and reports what it could not add.

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
