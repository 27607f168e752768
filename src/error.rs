//! # Error Handling
//!
//! This module defines the error taxonomy of the build pipeline. Each stage
//! owns a `thiserror` enum so callers can tell the stages apart, and the
//! crate-level [`Error`] wraps them for functions that span several stages.
//!
//! ## Key Components
//!
//! - **`ScanError`**: the repository comparison could not be performed (bad
//!   git reference, not a repository, git not runnable). Fatal to the run.
//! - **`MetadataError`**: an action's `README.md` is missing, unparsable, or
//!   lacks the required `name`/`version` fields. Fatal to the run.
//! - **`BuildError`**: the remote build service rejected or failed one build.
//!   Recorded per action; whether the run continues is decided by the
//!   orchestrator's [`FailurePolicy`](crate::orchestrator::FailurePolicy).
//! - **`Error`**: the run-ending failures (scan and metadata), plus
//!   configuration and I/O errors. Build errors never end a run, so they
//!   stay in the run's report instead of converting into `Error`.
//!
//! `Result<T>` is an alias for `std::result::Result<T, Error>`.

use std::path::PathBuf;

use thiserror::Error;

/// The set of changed actions could not be computed.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The `git` binary could not be started.
    #[error("Failed to run git in {repo}: {message}")]
    GitUnavailable { repo: PathBuf, message: String },

    /// `git` ran but exited unsuccessfully, typically because the reference
    /// does not exist or the directory is not a repository.
    #[error("git {command} failed for {git_ref}: {stderr}")]
    GitCommand {
        command: String,
        git_ref: String,
        stderr: String,
    },

    /// `git` produced output that is not valid UTF-8.
    #[error("git produced unreadable output: {message}")]
    Output { message: String },
}

/// An action's documentation could not be turned into a manifest.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// The README file could not be opened or read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The front matter block is not valid YAML, or is not a mapping.
    #[error("Malformed front matter: {message}")]
    FrontMatter { message: String },

    /// A required field is absent or empty.
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    /// The manifest describes a different action than the directory it was
    /// found in.
    #[error("Manifest {found} does not match action {expected}")]
    IdentityMismatch { expected: String, found: String },

    /// The parser failed after the README was located; carries the action
    /// the README belongs to.
    #[error("Invalid README for {action}: {source}")]
    Action {
        action: String,
        #[source]
        source: Box<MetadataError>,
    },
}

/// The remote build service did not produce the requested image.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The build context or recipe did not exist at submission time.
    #[error("Build input does not exist: {}", path.display())]
    MissingInput { path: PathBuf },

    /// The build client binary could not be started.
    #[error("Failed to start build client '{client}': {message}")]
    ClientUnavailable { client: String, message: String },

    /// The build service reported a failure.
    #[error("Build of {tag} failed ({status}){}", format_tail(output))]
    Remote {
        tag: String,
        status: String,
        /// Last lines of the client's output.
        output: Vec<String>,
    },

    /// The build was interrupted before it completed.
    #[error("Build of {tag} was cancelled")]
    Cancelled { tag: String },

    /// Waiting on the build client failed.
    #[error("I/O error while building {tag}: {source}")]
    Io {
        tag: String,
        #[source]
        source: std::io::Error,
    },
}

fn format_tail(lines: &[String]) -> String {
    if lines.is_empty() {
        String::new()
    } else {
        format!(":\n  {}", lines.join("\n  "))
    }
}

/// Main error type for the build pipeline.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to scan for modified actions: {0}")]
    Scan(#[from] ScanError),

    #[error("Failed to derive manifest: {0}")]
    Metadata(#[from] MetadataError),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
