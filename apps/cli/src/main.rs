//! rollcall CLI: voter-roll extraction and embedding tool.
//!
//! Converts semi-structured HTML electoral rolls into normalized ward JSON
//! files and enriches each voter with a name/guardian text embedding.

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
