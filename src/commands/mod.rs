//! # CLI Command Implementations
//!
//! Each subcommand of `hub` lives in its own file with an `Args` struct
//! derived with `clap` and an `execute` function that resolves the arguments
//! and calls into the `action_hub` library.

pub mod build;
pub mod completions;
