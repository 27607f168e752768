//! Default values for build runs.
//!
//! This module provides centralized default values used by the CLI flags and
//! by [`BuildOptions::default`](crate::orchestrator::BuildOptions), so both
//! agree on what an unconfigured run does.

/// Directory, relative to the repository root, that holds the actions.
pub const ACTIONS_DIR: &str = "actions";

/// Build recipe file inside every action version directory.
pub const RECIPE_FILE: &str = "Dockerfile";

/// Image repository the action images are tagged under.
pub const CONTAINER_REPO: &str = "quay.io/tinkerbell-actions";

/// Git reference compared against; all parents of `HEAD`.
pub const GIT_REF: &str = "HEAD^@";

/// Address of the BuildKit daemon when `BUILDKIT_HOST` is not set.
#[cfg(not(windows))]
pub const BUILDKIT_ADDR: &str = "unix:///run/buildkit/buildkitd.sock";
#[cfg(windows)]
pub const BUILDKIT_ADDR: &str = "npipe:////./pipe/buildkitd";

/// The BuildKit client used to submit builds.
pub const BUILDCTL: &str = "buildctl";

/// Target platforms built for every action.
///
/// `linux/arm/v6` is left out: its emulated builds take far longer than
/// the other platforms combined.
pub const PLATFORMS: &str = "linux/amd64,linux/arm64,linux/arm/v7";
