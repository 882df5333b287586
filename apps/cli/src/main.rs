//! chronomark CLI: reorder a markdown document by when its lines were added.
//!
//! Reads a document and the `git log -p` history of that file, dates every
//! fragment, and writes a month-by-month chronological view.

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
