//! Build command implementation
//!
//! `hub build` runs one pass of the pipeline:
//! 1. Scan git for actions changed since `--git-ref`
//! 2. Report when nothing changed, or list the changes with `--dry-run`
//! 3. Derive every manifest, then build each action's image with BuildKit
//!
//! Any build failure or an interrupted run exits with status 1 after every
//! result has been reported.

use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;

use action_hub::cancel::CancelToken;
use action_hub::defaults;
use action_hub::dispatch::PlatformList;
use action_hub::orchestrator::{BuildOptions, FailurePolicy, Orchestrator, RunOutcome};
use action_hub::output::{ConsoleReporter, OutputConfig};

/// Arguments for the build command
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Root of the actions repository
    #[arg(long, value_name = "PATH", env = "HUB_CONTEXT", default_value = ".")]
    pub context: PathBuf,

    /// Directory holding the actions, relative to the context
    #[arg(long, value_name = "DIR", env = "HUB_ACTIONS_DIR", default_value = defaults::ACTIONS_DIR)]
    pub actions_dir: String,

    /// Repository the images are tagged under
    #[arg(long, value_name = "REPO", env = "HUB_CONTAINER_REPO", default_value = defaults::CONTAINER_REPO)]
    pub container_repo: String,

    /// Only list the modified actions
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Print the dry-run listing as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,

    /// Build without using the remote build cache
    #[arg(long)]
    pub no_cache: bool,

    /// Push the images after building them
    #[arg(long)]
    pub push: bool,

    /// Git reference that changes are detected against
    #[arg(long, value_name = "REF", env = "HUB_GIT_REF", default_value = defaults::GIT_REF)]
    pub git_ref: String,

    /// Address of the BuildKit daemon
    #[arg(long, value_name = "ADDR", env = "BUILDKIT_HOST", default_value = defaults::BUILDKIT_ADDR)]
    pub buildkit_addr: String,

    /// The buildctl executable
    #[arg(long, value_name = "PATH", env = "HUB_BUILDCTL", default_value = defaults::BUILDCTL)]
    pub buildctl: PathBuf,

    /// Comma-separated target platforms
    #[arg(long, value_name = "LIST", env = "HUB_PLATFORMS", default_value = defaults::PLATFORMS)]
    pub platforms: PlatformList,

    /// What to do after a build fails
    #[arg(long, value_enum, value_name = "POLICY", env = "HUB_ON_FAILURE", default_value = "continue")]
    pub on_failure: FailurePolicy,
}

impl BuildArgs {
    fn into_options(self) -> BuildOptions {
        BuildOptions {
            context: self.context,
            actions_dir: self.actions_dir,
            container_repo: self.container_repo,
            git_ref: self.git_ref,
            dry_run: self.dry_run,
            push: self.push,
            no_cache: self.no_cache,
            daemon_address: self.buildkit_addr,
            buildctl: self.buildctl,
            platforms: self.platforms,
            failure_policy: self.on_failure,
        }
    }
}

/// Execute the build command
pub fn execute(args: BuildArgs, color: &str) -> Result<()> {
    let json = args.json;
    let mut reporter =
        ConsoleReporter::stdout(OutputConfig::from_env_and_flag(color)).with_json(json);
    let cancel = CancelToken::on_interrupt()?;

    let result = Orchestrator::new(args.into_options())
        .with_cancel_token(cancel)
        .run(&mut reporter)?;

    if let RunOutcome::Built(report) = &result.outcome {
        if report.cancelled {
            bail!("Build run was interrupted");
        }
        if !report.failed.is_empty() {
            bail!(
                "{} of {} action(s) failed to build",
                report.failed.len(),
                result.actions.len()
            );
        }
    }
    Ok(())
}
