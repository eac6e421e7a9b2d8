//! EventIntel CLI: event risk intelligence from the command line.
//!
//! Profiles an event with a local language model, scores its risk against
//! institutional rules and past incidents, and drafts a landing page.

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
