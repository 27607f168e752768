//! # Action Hub CLI
//!
//! This is the binary entry point for the `hub` command-line tool.
//!
//! It parses the command line with `clap`, sets up logging, and runs the
//! selected command. Failures surface as an `anyhow` error, which makes the
//! process exit with status 1; usage errors exit with status 2.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
