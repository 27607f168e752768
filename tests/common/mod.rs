//! Shared test utilities for E2E tests.
//!
//! [`TestFixture`] is a throwaway git repository laid out like an actions
//! repository. Actions committed with [`TestFixture::commit_action`] are
//! what `HEAD^@` sees as modified. A fake `buildctl` script records the
//! arguments it was called with so tests can assert on build submissions
//! without a BuildKit daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let Some(fixture) = TestFixture::new() else { return };
//!     fixture.commit_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
//!     fixture.command().args(["build", "--dry-run"]).assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::readmes;
    pub use super::TestFixture;
}

/// README bodies for test actions.
#[allow(dead_code)]
pub mod readmes {
    /// A README whose front matter matches `actions/<name>/<version>`.
    pub fn valid(name: &str, version: &str) -> String {
        format!(
            "---\nslug: {name}\nname: {name}\nversion: {version}\ntags: [disk]\n---\n\n# {name}\n\nDoes {name} things.\n"
        )
    }

    /// A README with no `version` field.
    pub fn missing_version(name: &str) -> String {
        format!("---\nslug: {name}\n---\n\n# {name}\n")
    }
}

/// Variables that would otherwise leak the developer's configuration into
/// the binary under test.
const ISOLATED_ENV: &[&str] = &[
    "HUB_CONTEXT",
    "HUB_ACTIONS_DIR",
    "HUB_CONTAINER_REPO",
    "HUB_GIT_REF",
    "HUB_BUILDCTL",
    "HUB_PLATFORMS",
    "HUB_ON_FAILURE",
    "BUILDKIT_HOST",
    "RUST_LOG",
];

/// Returns `true` when a usable `git` binary is on `PATH`.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// A temporary git repository with an `actions/` directory.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create the repository with one initial commit.
    ///
    /// Returns `None` when git is not installed, so callers can skip.
    pub fn new() -> Option<Self> {
        if !git_available() {
            eprintln!("git not available, skipping");
            return None;
        }
        let fixture = Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        };
        fixture.git(&["init", "--quiet"]);
        fixture
            .temp_dir
            .child("actions/.keep")
            .write_str("")
            .expect("Failed to create actions directory");
        fixture.commit("initial");
        Some(fixture)
    }

    fn git(&self, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(self.path())
            .args(["-c", "user.name=Hub Tests", "-c", "user.email=hub@example.com"])
            .args(["-c", "commit.gpgsign=false"])
            .args(args)
            .status()
            .expect("Failed to run git");
        assert!(status.success(), "git {:?} failed", args);
    }

    fn commit(&self, message: &str) {
        self.git(&["add", "--all"]);
        self.git(&["commit", "--quiet", "--allow-empty", "-m", message]);
    }

    /// Write `actions/<name>/<version>/{README.md,Dockerfile}` without
    /// committing.
    pub fn write_action(&self, name: &str, version: &str, readme: &str) -> &Self {
        let dir = format!("actions/{}/{}", name, version);
        self.temp_dir
            .child(format!("{}/README.md", dir))
            .write_str(readme)
            .expect("Failed to write README");
        self.temp_dir
            .child(format!("{}/Dockerfile", dir))
            .write_str("FROM alpine:3.20\n")
            .expect("Failed to write Dockerfile");
        self
    }

    /// Add an action in a new commit, so `HEAD^@` sees it as modified.
    pub fn commit_action(&self, name: &str, version: &str, readme: &str) -> &Self {
        self.write_action(name, version, readme);
        self.commit(&format!("Add {}/{}", name, version));
        self
    }

    /// Commit whatever is in the working tree.
    #[allow(dead_code)]
    pub fn commit_all(&self, message: &str) -> &Self {
        self.commit(message);
        self
    }

    /// Add a file outside of any action.
    #[allow(dead_code)]
    pub fn with_file(&self, path: &str, content: &str) -> &Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Install a fake `buildctl` outside the repository that appends its
    /// arguments, one per line, to [`TestFixture::buildctl_log`] and exits
    /// with `exit_code`.
    #[cfg(unix)]
    #[allow(dead_code)]
    pub fn fake_buildctl(&self, exit_code: i32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            "#!/bin/sh\nfor arg in \"$@\"; do echo \"$arg\" >> '{}'; done\necho '::end::' >> '{}'\necho '#1 [internal] load build definition from Dockerfile'\nexit {}\n",
            self.buildctl_log().display(),
            self.buildctl_log().display(),
            exit_code
        );
        let path = self.tools_dir().join("buildctl");
        std::fs::write(&path, script).expect("Failed to write fake buildctl");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake buildctl executable");
        path
    }

    fn tools_dir(&self) -> PathBuf {
        let dir = self.path().join(".git").join("hub-tools");
        std::fs::create_dir_all(&dir).expect("Failed to create tools directory");
        dir
    }

    /// File the fake `buildctl` records its invocations in.
    #[allow(dead_code)]
    pub fn buildctl_log(&self) -> PathBuf {
        self.path().join(".git").join("buildctl-args.log")
    }

    /// Invocations of the fake `buildctl`, each as its list of arguments.
    #[allow(dead_code)]
    pub fn buildctl_calls(&self) -> Vec<Vec<String>> {
        let Ok(log) = std::fs::read_to_string(self.buildctl_log()) else {
            return Vec::new();
        };
        log.split("::end::\n")
            .filter(|call| !call.is_empty())
            .map(|call| call.lines().map(str::to_string).collect())
            .collect()
    }

    /// Get the path to the repository.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a `hub` command running in this repository with a clean
    /// environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("hub");
        cmd.current_dir(self.path());
        for var in ISOLATED_ENV {
            cmd.env_remove(var);
        }
        cmd.env("NO_COLOR", "1");
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_a_git_repository() {
        let Some(fixture) = TestFixture::new() else {
            return;
        };
        assert!(fixture.path().join(".git").is_dir());
        assert!(fixture.path().join("actions").is_dir());
    }

    #[test]
    fn test_write_action_layout() {
        let Some(fixture) = TestFixture::new() else {
            return;
        };
        fixture.write_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
        let dir = fixture.path().join("actions/foo/v1.0.0");
        assert!(dir.join("README.md").is_file());
        assert!(dir.join("Dockerfile").is_file());
    }
}
