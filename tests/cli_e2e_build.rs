//! End-to-end tests for the `hub build` command.
//!
//! Each test runs the binary inside a throwaway git repository. Builds are
//! submitted to a fake `buildctl` that records its arguments.

#[allow(dead_code)]
mod common;
use common::prelude::*;

#[test]
fn test_build_help() {
    let mut cmd = cargo_bin_cmd!("hub");
    cmd.arg("build")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--git-ref"))
        .stdout(predicate::str::contains("--container-repo"))
        .stdout(predicate::str::contains("--on-failure"));
}

#[test]
fn test_dry_run_lists_modified_actions() {
    let Some(fixture) = TestFixture::new() else {
        return;
    };
    fixture.write_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
    fixture.write_action("bar", "v2.0.0", &readmes::valid("bar", "v2.0.0"));
    fixture.commit_all("Add foo and bar");

    fixture
        .command()
        .args(["build", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "The following actions were modified and need to be rebuilt:",
        ))
        .stdout(predicate::str::contains("   bar/v2.0.0\n   foo/v1.0.0\n"));
}

#[test]
fn test_dry_run_json() {
    let Some(fixture) = TestFixture::new() else {
        return;
    };
    fixture.commit_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));

    let output = fixture
        .command()
        .args(["build", "--dry-run", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let listed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(listed, serde_json::json!([{ "name": "foo", "version": "v1.0.0" }]));
}

#[test]
fn test_dry_run_ignores_files_outside_actions() {
    let Some(fixture) = TestFixture::new() else {
        return;
    };
    fixture.with_file("docs/intro.md", "# Hub\n").commit_all("Docs");

    fixture
        .command()
        .args(["build", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No actions were modified since the provided git reference",
        ));
}

#[test]
fn test_only_the_latest_commit_is_compared() {
    let Some(fixture) = TestFixture::new() else {
        return;
    };
    fixture.commit_action("old", "v1.0.0", &readmes::valid("old", "v1.0.0"));
    fixture.commit_action("new", "v1.0.0", &readmes::valid("new", "v1.0.0"));

    fixture
        .command()
        .args(["build", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("new/v1.0.0"))
        .stdout(predicate::str::contains("old/v1.0.0").not());
}

#[test]
fn test_explicit_git_ref_widens_the_comparison() {
    let Some(fixture) = TestFixture::new() else {
        return;
    };
    fixture.commit_action("old", "v1.0.0", &readmes::valid("old", "v1.0.0"));
    fixture.commit_action("new", "v1.0.0", &readmes::valid("new", "v1.0.0"));

    fixture
        .command()
        .args(["build", "--dry-run", "--git-ref", "HEAD~2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("new/v1.0.0"))
        .stdout(predicate::str::contains("old/v1.0.0"));
}

#[test]
fn test_bad_git_ref_fails_the_scan() {
    let Some(fixture) = TestFixture::new() else {
        return;
    };

    fixture
        .command()
        .args(["build", "--dry-run", "--git-ref", "no-such-ref"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to scan for modified actions"));
}

#[test]
fn test_metadata_failure_builds_nothing() {
    let Some(fixture) = TestFixture::new() else {
        return;
    };
    fixture.write_action("aaa", "v1.0.0", &readmes::valid("aaa", "v1.0.0"));
    fixture.write_action("zzz", "v1.0.0", &readmes::missing_version("zzz"));
    fixture.commit_all("Add actions");

    #[cfg(unix)]
    let buildctl = fixture.fake_buildctl(0);
    #[cfg(not(unix))]
    let buildctl = std::path::PathBuf::from("buildctl");

    fixture
        .command()
        .arg("build")
        .arg("--buildctl")
        .arg(&buildctl)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("zzz/v1.0.0"))
        .stderr(predicate::str::contains("version"));

    assert!(fixture.buildctl_calls().is_empty());
}

#[cfg(unix)]
mod with_fake_buildctl {
    use super::*;

    #[test]
    fn test_build_submits_one_multi_platform_build() {
        let Some(fixture) = TestFixture::new() else {
            return;
        };
        fixture.commit_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
        let buildctl = fixture.fake_buildctl(0);

        fixture
            .command()
            .arg("build")
            .arg("--buildctl")
            .arg(&buildctl)
            .args(["--buildkit-addr", "tcp://buildkitd:1234"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "[BUILD] [1/1] foo/v1.0.0 -> quay.io/tinkerbell-actions/foo:v1.0.0",
            ))
            .stdout(predicate::str::contains("1 built, 0 failed, 0 not attempted"));

        let calls = fixture.buildctl_calls();
        assert_eq!(calls.len(), 1);
        let args = &calls[0];
        assert_eq!(args[0..3], ["--addr", "tcp://buildkitd:1234", "build"]);
        assert!(args.contains(&"platform=linux/amd64,linux/arm64,linux/arm/v7".to_string()));
        assert!(args.contains(
            &"type=image,name=quay.io/tinkerbell-actions/foo:v1.0.0,push=false".to_string()
        ));
        assert!(!args.contains(&"--no-cache".to_string()));
    }

    #[test]
    fn test_build_with_push_and_custom_repo() {
        let Some(fixture) = TestFixture::new() else {
            return;
        };
        fixture.commit_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
        let buildctl = fixture.fake_buildctl(0);

        fixture
            .command()
            .arg("build")
            .arg("--push")
            .arg("--no-cache")
            .env("HUB_BUILDCTL", &buildctl)
            .env("HUB_CONTAINER_REPO", "localhost:5000/actions/")
            .env("HUB_PLATFORMS", "linux/arm64")
            .assert()
            .success()
            .stdout(predicate::str::contains("pushed localhost:5000/actions/foo:v1.0.0"));

        let args = &fixture.buildctl_calls()[0];
        assert!(args.contains(&"platform=linux/arm64".to_string()));
        assert!(args.contains(
            &"type=image,name=localhost:5000/actions/foo:v1.0.0,push=true".to_string()
        ));
        assert!(args.contains(&"--no-cache".to_string()));
    }

    #[test]
    fn test_build_failure_exits_nonzero_after_building_the_rest() {
        let Some(fixture) = TestFixture::new() else {
            return;
        };
        fixture.write_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
        fixture.write_action("bar", "v2.0.0", &readmes::valid("bar", "v2.0.0"));
        fixture.commit_all("Add foo and bar");
        let buildctl = fixture.fake_buildctl(1);

        fixture
            .command()
            .arg("build")
            .arg("--buildctl")
            .arg(&buildctl)
            .assert()
            .code(1)
            .stdout(predicate::str::contains("0 built, 2 failed, 0 not attempted"))
            .stderr(predicate::str::contains("2 of 2 action(s) failed to build"));

        assert_eq!(fixture.buildctl_calls().len(), 2);
    }

    #[test]
    fn test_abort_policy_stops_after_first_failure() {
        let Some(fixture) = TestFixture::new() else {
            return;
        };
        fixture.write_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
        fixture.write_action("bar", "v2.0.0", &readmes::valid("bar", "v2.0.0"));
        fixture.commit_all("Add foo and bar");
        let buildctl = fixture.fake_buildctl(1);

        fixture
            .command()
            .arg("build")
            .arg("--buildctl")
            .arg(&buildctl)
            .args(["--on-failure", "abort"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("[FAILED] bar/v2.0.0"))
            .stdout(predicate::str::contains("Skipping 1 action(s) after a failed build"))
            .stdout(predicate::str::contains("   foo/v1.0.0"));

        assert_eq!(fixture.buildctl_calls().len(), 1);
    }

    #[test]
    fn test_dry_run_never_calls_buildctl() {
        let Some(fixture) = TestFixture::new() else {
            return;
        };
        fixture.commit_action("foo", "v1.0.0", &readmes::valid("foo", "v1.0.0"));
        let buildctl = fixture.fake_buildctl(0);

        fixture
            .command()
            .args(["build", "--dry-run", "--push"])
            .arg("--buildctl")
            .arg(&buildctl)
            .assert()
            .success();

        assert!(fixture.buildctl_calls().is_empty());
    }
}
