//! crewout CLI: persist crew run results as JSON and Markdown.
//!
//! Reads the result document a crew run produced and writes one
//! timestamped execution folder per run.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
