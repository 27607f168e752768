//! # Action Hub
//!
//! This library builds the container images of a repository of hardware
//! provisioning actions. It is used by the `hub` command-line tool, which CI
//! runs on every change to the repository.
//!
//! ## Quick Example
//!
//! ```
//! use action_hub::locator::group_actions;
//! use action_hub::manifest::parse_readme;
//!
//! let actions = group_actions(
//!     ["actions/rootio/v1.0.0/README.md", "actions/rootio/v1.0.0/Dockerfile"],
//!     "actions",
//! );
//! assert_eq!(actions.len(), 1);
//! assert_eq!(actions[0].to_string(), "rootio/v1.0.0");
//!
//! let manifest = parse_readme("---\nslug: rootio\nversion: v1.0.0\n---\n# Rootio\n").unwrap();
//! assert_eq!(manifest.image_tag("quay.io/tinkerbell-actions"),
//!            "quay.io/tinkerbell-actions/rootio:v1.0.0");
//! ```
//!
//! ## Core Concepts
//!
//! - **Actions (`locator`)**: an action is a `<name>/<version>` directory
//!   below the actions directory. The locator asks git which files changed
//!   and maps them back to actions.
//! - **Manifests (`manifest`)**: every action documents itself in a
//!   `README.md` whose front matter names the action and its version. The
//!   manifest decides the image tag.
//! - **Dispatch (`dispatch`)**: a build request is handed to BuildKit, which
//!   builds every target platform and optionally pushes the image.
//! - **Orchestration (`orchestrator`)**: one run scans, then either reports
//!   that nothing changed, lists the changed actions (dry run), or builds
//!   them one after another.
//!
//! Errors are typed per stage in [`error`]; user-facing output goes through
//! the [`output::Reporter`] trait and diagnostics through the `log` facade.

pub mod cancel;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod git;
pub mod locator;
pub mod manifest;
pub mod orchestrator;
pub mod output;

#[cfg(test)]
mod locator_proptest;
