//! # Changed Action Discovery
//!
//! Actions live in a conventional layout under the repository's actions
//! directory:
//!
//! ```text
//! actions/
//!   <name>/
//!     <version>/
//!       README.md
//!       Dockerfile
//! ```
//!
//! The [`ActionLocator`] asks a [`ChangeDetector`] which files differ from a
//! git reference, groups those files by their `<name>/<version>` segments
//! and returns one [`Action`] per group. Files that are not inside a version
//! directory are ignored, as are groups whose directory no longer exists
//! (the action was deleted).
//!
//! The change detector is a trait so that tests can supply a fixed list of
//! changed paths without creating a git repository.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use semver::Version;
use serde::Serialize;

use crate::error::ScanError;

/// One buildable unit, identified by its name and version directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Action {
    pub name: String,
    pub version: String,
}

impl Action {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Directory of this action relative to the actions root.
    pub fn path(&self) -> PathBuf {
        Path::new(&self.name).join(&self.version)
    }

    /// Directory of this action below `actions_root`.
    pub fn dir_in(&self, actions_root: &Path) -> PathBuf {
        actions_root.join(self.path())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

impl Ord for Action {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| compare_versions(&self.version, &other.version))
    }
}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Order version directory names.
///
/// Semantic versions (with or without a leading `v`) compare by precedence,
/// so `v1.10.0` sorts after `v1.9.0`. Anything else, and ties such as `v1.0.0`
/// against `1.0.0`, fall back to plain string order.
fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |s: &str| Version::parse(s.strip_prefix('v').unwrap_or(s)).ok();
    match (parse(a), parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}

/// Source of changed file paths.
pub trait ChangeDetector: Send + Sync {
    /// Paths relative to `repo` that differ from `git_ref`, limited to
    /// `pathspec`.
    fn changed_paths(
        &self,
        repo: &Path,
        git_ref: &str,
        pathspec: &str,
    ) -> Result<Vec<String>, ScanError>;
}

/// Change detection backed by the system `git` binary.
pub struct GitChangeDetector;

impl ChangeDetector for GitChangeDetector {
    fn changed_paths(
        &self,
        repo: &Path,
        git_ref: &str,
        pathspec: &str,
    ) -> Result<Vec<String>, ScanError> {
        crate::git::changed_paths(repo, git_ref, pathspec)
    }
}

/// Finds the actions that changed since a git reference.
pub struct ActionLocator {
    detector: Box<dyn ChangeDetector>,
}

impl Default for ActionLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionLocator {
    /// Create a locator that uses git for change detection.
    pub fn new() -> Self {
        Self {
            detector: Box::new(GitChangeDetector),
        }
    }

    /// Create a locator with a custom change detector.
    pub fn with_detector(detector: Box<dyn ChangeDetector>) -> Self {
        Self { detector }
    }

    /// Enumerate the actions under `repo_root/actions_subpath` that differ
    /// from `git_ref`.
    ///
    /// The result is sorted by name, then version, and contains each
    /// `(name, version)` pair at most once. An empty result is not an error.
    pub fn locate(
        &self,
        repo_root: &Path,
        actions_subpath: &str,
        git_ref: &str,
    ) -> Result<Vec<Action>, ScanError> {
        let subpath = normalize_subpath(actions_subpath);
        let paths = self.detector.changed_paths(repo_root, git_ref, &subpath)?;
        let actions_root = repo_root.join(&subpath);

        let actions = group_actions(paths.iter().map(String::as_str), &subpath)
            .into_iter()
            .filter(|action| {
                let exists = action.dir_in(&actions_root).is_dir();
                if !exists {
                    debug!("Skipping {}: directory no longer exists", action);
                }
                exists
            })
            .collect();

        Ok(actions)
    }
}

fn normalize_subpath(subpath: &str) -> String {
    let trimmed = subpath.trim_end_matches('/');
    trimmed.strip_prefix("./").unwrap_or(trimmed).to_string()
}

/// Group changed file paths into distinct actions.
///
/// A path contributes an action only when it names a file inside
/// `<actions_subpath>/<name>/<version>/`.
pub fn group_actions<'a>(
    paths: impl IntoIterator<Item = &'a str>,
    actions_subpath: &str,
) -> Vec<Action> {
    let prefix = format!("{}/", normalize_subpath(actions_subpath));
    let mut actions = BTreeSet::new();

    for path in paths {
        let Some(rest) = path.strip_prefix(&prefix) else {
            continue;
        };
        let mut segments = rest.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(name), Some(version), Some(file))
                if !name.is_empty() && !version.is_empty() && !file.is_empty() =>
            {
                actions.insert(Action::new(name, version));
            }
            _ => {}
        }
    }

    actions.into_iter().collect()
}
