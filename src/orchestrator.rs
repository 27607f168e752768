//! Orchestrator for a complete build run
//!
//! This module ties the pipeline together:
//!
//! 1. **Scanning**: the [`ActionLocator`] lists the actions that changed
//!    since the configured git reference. A scan failure ends the run.
//! 2. **Empty**: nothing changed; the run succeeds without doing anything.
//! 3. **Listing**: in dry-run mode the changed actions are reported and the
//!    run ends. No manifests are derived and nothing is dispatched.
//! 4. **Building**: every changed action's manifest is derived and its
//!    [`BuildRequest`] planned before the first dispatch, so a broken README
//!    anywhere in the batch aborts the run before any image is built or
//!    pushed. The requests are then dispatched one at a time, in locator
//!    order. What happens after a failed build is decided by the
//!    [`FailurePolicy`].
//!
//! [`Orchestrator::state`] reports where the pipeline is; after
//! [`Orchestrator::run`] returns it is always [`State::Done`].

use std::path::PathBuf;

use clap::ValueEnum;
use log::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::defaults;
use crate::dispatch::{BuildRequest, BuildctlDispatcher, DispatchOutcome, ImageDispatcher, PlatformList};
use crate::error::{BuildError, Result};
use crate::locator::{Action, ActionLocator};
use crate::manifest::ManifestDeriver;
use crate::output::Reporter;

/// What to do with the rest of the batch after a build fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailurePolicy {
    /// Stop at the first failed build; later actions are not attempted.
    Abort,
    /// Attempt every action and report all failures at the end.
    #[default]
    Continue,
}

/// Resolved configuration of one build run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Root of the actions repository.
    pub context: PathBuf,
    /// Actions directory, relative to `context`.
    pub actions_dir: String,
    /// Image repository prefix, e.g. `quay.io/tinkerbell-actions`.
    pub container_repo: String,
    /// Reference that changes are detected against.
    pub git_ref: String,
    pub dry_run: bool,
    pub push: bool,
    pub no_cache: bool,
    /// Address of the BuildKit daemon.
    pub daemon_address: String,
    /// The `buildctl` executable.
    pub buildctl: PathBuf,
    pub platforms: PlatformList,
    pub failure_policy: FailurePolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            actions_dir: defaults::ACTIONS_DIR.to_string(),
            container_repo: defaults::CONTAINER_REPO.to_string(),
            git_ref: defaults::GIT_REF.to_string(),
            dry_run: false,
            push: false,
            no_cache: false,
            daemon_address: defaults::BUILDKIT_ADDR.to_string(),
            buildctl: PathBuf::from(defaults::BUILDCTL),
            platforms: PlatformList::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl BuildOptions {
    fn actions_root(&self) -> PathBuf {
        self.context.join(&self.actions_dir)
    }
}

/// Pipeline states, in the order a run moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Scanning,
    Empty,
    Listing,
    Building,
    Done,
}

/// A successfully built (and possibly pushed) image.
#[derive(Debug)]
pub struct BuiltImage {
    pub action: Action,
    pub outcome: DispatchOutcome,
}

/// A build the remote service did not complete.
#[derive(Debug)]
pub struct FailedBuild {
    pub action: Action,
    pub image_tag: String,
    pub error: BuildError,
}

/// Per-action results of the Building state.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub built: Vec<BuiltImage>,
    pub failed: Vec<FailedBuild>,
    /// Actions skipped after an abort or a cancellation.
    pub not_attempted: Vec<Action>,
    pub cancelled: bool,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    NothingToBuild,
    Listed,
    Built(BuildReport),
}

/// Aggregate result of one run.
#[derive(Debug)]
pub struct RunResult {
    /// The changed actions, in processing order.
    pub actions: Vec<Action>,
    pub outcome: RunOutcome,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        match &self.outcome {
            RunOutcome::NothingToBuild | RunOutcome::Listed => true,
            RunOutcome::Built(report) => report.is_success(),
        }
    }
}

/// Drives one build run through the pipeline states.
pub struct Orchestrator {
    options: BuildOptions,
    locator: ActionLocator,
    deriver: ManifestDeriver,
    dispatcher: Box<dyn ImageDispatcher>,
    cancel: CancelToken,
    state: State,
}

impl Orchestrator {
    /// An orchestrator with git change detection, README manifests, and
    /// `buildctl` dispatch.
    pub fn new(options: BuildOptions) -> Self {
        let dispatcher = BuildctlDispatcher::new(options.buildctl.clone());
        Self {
            options,
            locator: ActionLocator::new(),
            deriver: ManifestDeriver::new(),
            dispatcher: Box::new(dispatcher),
            cancel: CancelToken::new(),
            state: State::Idle,
        }
    }

    pub fn with_locator(mut self, locator: ActionLocator) -> Self {
        self.locator = locator;
        self
    }

    pub fn with_deriver(mut self, deriver: ManifestDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Box<dyn ImageDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn transition(&mut self, next: State) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// The state the pipeline is in: `Idle` before [`Orchestrator::run`],
    /// `Done` after it returns.
    pub fn state(&self) -> State {
        self.state
    }

    /// Execute the run.
    ///
    /// Scan and metadata failures are returned as errors. Build failures are
    /// not: they are logged, reported, and recorded in the returned
    /// [`RunResult`]. The orchestrator ends in [`State::Done`] either way.
    pub fn run(&mut self, reporter: &mut dyn Reporter) -> Result<RunResult> {
        let result = self.scan_and_build(reporter);
        self.transition(State::Done);
        result
    }

    fn scan_and_build(&mut self, reporter: &mut dyn Reporter) -> Result<RunResult> {
        self.transition(State::Scanning);
        let actions = self.locator.locate(
            &self.options.context,
            &self.options.actions_dir,
            &self.options.git_ref,
        )?;
        info!(
            "{} action(s) changed since {}",
            actions.len(),
            self.options.git_ref
        );

        let outcome = if actions.is_empty() {
            self.transition(State::Empty);
            reporter.nothing_to_build()?;
            RunOutcome::NothingToBuild
        } else if self.options.dry_run {
            self.transition(State::Listing);
            reporter.list_actions(&actions)?;
            RunOutcome::Listed
        } else {
            self.transition(State::Building);
            let requests = self.plan(&actions)?;
            RunOutcome::Built(self.build_all(&actions, requests, reporter)?)
        };

        Ok(RunResult { actions, outcome })
    }

    /// Derive every manifest and resolve every build request.
    fn plan(&self, actions: &[Action]) -> Result<Vec<BuildRequest>> {
        let actions_root = self.options.actions_root();
        actions
            .iter()
            .map(|action| {
                let dir = action.dir_in(&actions_root);
                let manifest = self.deriver.derive(&dir, action)?;
                let image_tag = manifest.image_tag(&self.options.container_repo);
                debug!("{} will be tagged {}", action, image_tag);
                Ok(BuildRequest {
                    recipe_path: dir.join(defaults::RECIPE_FILE),
                    context_path: dir,
                    image_tag,
                    platforms: self.options.platforms.clone(),
                    push: self.options.push,
                    no_cache: self.options.no_cache,
                    daemon_address: self.options.daemon_address.clone(),
                })
            })
            .collect()
    }

    fn build_all(
        &self,
        actions: &[Action],
        requests: Vec<BuildRequest>,
        reporter: &mut dyn Reporter,
    ) -> Result<BuildReport> {
        let total = actions.len();
        let mut report = BuildReport::default();

        for (index, (action, request)) in actions.iter().zip(requests).enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                report.not_attempted = actions[index..].to_vec();
                warn!("Run cancelled; {} action(s) not started", total - index);
                reporter.skipped(&report.not_attempted, "because the run was cancelled")?;
                break;
            }

            reporter.building(index + 1, total, action, &request)?;
            match self.dispatcher.dispatch(&request, &self.cancel) {
                Ok(outcome) => {
                    reporter.built(action, &outcome)?;
                    report.built.push(BuiltImage {
                        action: action.clone(),
                        outcome,
                    });
                }
                Err(err) => {
                    error!("Failed to build {}: {}", action, err);
                    reporter.build_failed(action, &err)?;
                    let cancelled = matches!(err, BuildError::Cancelled { .. });
                    report.failed.push(FailedBuild {
                        action: action.clone(),
                        image_tag: request.image_tag,
                        error: err,
                    });

                    let rest = &actions[index + 1..];
                    if cancelled {
                        report.cancelled = true;
                        report.not_attempted = rest.to_vec();
                        reporter.skipped(rest, "because the run was cancelled")?;
                        break;
                    }
                    if self.options.failure_policy == FailurePolicy::Abort {
                        report.not_attempted = rest.to_vec();
                        reporter.skipped(rest, "after a failed build")?;
                        break;
                    }
                }
            }
        }

        reporter.finished(&report)?;
        Ok(report)
    }
}
