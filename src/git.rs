use std::path::Path;
use std::process::Command;

use log::debug;

use crate::error::ScanError;

/// List the paths that differ between the working tree and `git_ref`,
/// restricted to `pathspec`.
///
/// This uses the system git command, so any repository layout git itself
/// understands (worktrees, submodule checkouts, shallow clones) works.
/// `git_ref` is passed through verbatim: `HEAD^@`, a commit id, or a range
/// such as `HEAD~3..HEAD` are all accepted.
///
/// Returned paths are relative to `repo` (which may be a subdirectory of the
/// work tree) and use `/` separators, exactly as git prints them.
pub fn changed_paths(repo: &Path, git_ref: &str, pathspec: &str) -> Result<Vec<String>, ScanError> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["--no-pager", "diff", "--name-only", "-z", "--relative", git_ref, "--"])
        .arg(pathspec)
        .output()
        .map_err(|e| ScanError::GitUnavailable {
            repo: repo.to_path_buf(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScanError::GitCommand {
            command: "diff --name-only".to_string(),
            git_ref: git_ref.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8(output.stdout).map_err(|e| ScanError::Output {
        message: e.to_string(),
    })?;

    // With -z paths are NUL-terminated and never quoted, so names with
    // non-ASCII bytes or control characters come through verbatim.
    let paths: Vec<String> = stdout
        .split('\0')
        .filter(|path| !path.is_empty())
        .map(str::to_string)
        .collect();

    debug!(
        "git diff against {} reported {} changed path(s) under {}",
        git_ref,
        paths.len(),
        pathspec
    );

    Ok(paths)
}
