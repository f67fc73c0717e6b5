//! Ekimae CLI: station-area enrichment for Tokyo.
//!
//! Groups nearby stations into hubs, then enriches each hub with
//! encyclopedia themes and ranked points of interest, appending results to
//! a resumable JSON log.

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
