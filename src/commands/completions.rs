//! Completions command implementation
//!
//! Prints a completion script for `hub` to stdout:
//!
//! ```bash
//! hub completions bash > ~/.local/share/bash-completion/completions/hub
//! hub completions zsh > ~/.zfunc/_hub
//! ```

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::io::{self, Write};

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the completions command
pub fn execute(args: CompletionsArgs) -> Result<()> {
    write_completions(args.shell, &mut io::stdout())
}

fn write_completions(shell: Shell, out: &mut dyn Write) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "hub", out);
    out.flush()?;
    Ok(())
}
