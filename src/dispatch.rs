//! # Image Dispatch
//!
//! This module submits fully-resolved [`BuildRequest`]s to the remote build
//! service. The [`ImageDispatcher`] trait is the seam the orchestrator talks
//! to; [`BuildctlDispatcher`] is the production implementation and drives
//! the BuildKit `buildctl` client against a remote `buildkitd`.
//!
//! ## Guarantees
//!
//! - One request is one multi-platform build: every platform is passed to a
//!   single `buildctl build` invocation and BuildKit parallelizes across
//!   them.
//! - `dispatch` blocks until the build completes, fails, or is cancelled.
//! - Nothing is cached or remembered between calls.
//!
//! With `push` set, a successful dispatch publishes the image at its tag.
//! That is visible outside this process and cannot be undone, so callers
//! dispatch each request once.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::Serialize;

use crate::cancel::CancelToken;
use crate::error::{BuildError, Error};

/// How often the dispatcher checks for cancellation while a build runs.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Number of trailing client output lines kept for error reports.
const OUTPUT_TAIL: usize = 20;

/// An ordered, duplicate-free, non-empty list of target platforms such as
/// `linux/amd64`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformList(Vec<String>);

impl PlatformList {
    pub fn new<I, S>(platforms: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list: Vec<String> = Vec::new();
        for platform in platforms {
            let platform = platform.as_ref().trim();
            if platform.is_empty() {
                continue;
            }
            if platform.split('/').count() < 2 || platform.split('/').any(str::is_empty) {
                return Err(Error::Config {
                    message: format!(
                        "invalid platform '{}': expected <os>/<arch>[/<variant>]",
                        platform
                    ),
                });
            }
            if !list.iter().any(|p| p == platform) {
                list.push(platform.to_string());
            }
        }
        if list.is_empty() {
            return Err(Error::Config {
                message: "at least one target platform is required".to_string(),
            });
        }
        Ok(Self(list))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for PlatformList {
    fn default() -> Self {
        Self(
            crate::defaults::PLATFORMS
                .split(',')
                .map(str::to_string)
                .collect(),
        )
    }
}

impl FromStr for PlatformList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.split(','))
    }
}

impl fmt::Display for PlatformList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Everything the build service needs to produce one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Directory sent as the build context.
    pub context_path: PathBuf,
    /// Path of the Dockerfile.
    pub recipe_path: PathBuf,
    /// `<repository>/<name>:v<version>`.
    pub image_tag: String,
    pub platforms: PlatformList,
    pub push: bool,
    pub no_cache: bool,
    pub daemon_address: String,
}

/// Result of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub image_tag: String,
    pub pushed: bool,
    pub duration: Duration,
}

/// Submits build requests to a build service.
pub trait ImageDispatcher {
    /// Build (and, if requested, push) one image, blocking until done.
    ///
    /// When `cancel` fires mid-build the in-flight build is abandoned and
    /// [`BuildError::Cancelled`] is returned.
    fn dispatch(
        &self,
        request: &BuildRequest,
        cancel: &CancelToken,
    ) -> Result<DispatchOutcome, BuildError>;
}

/// Drives BuildKit through the `buildctl` command-line client.
#[derive(Debug, Clone)]
pub struct BuildctlDispatcher {
    client: PathBuf,
}

impl BuildctlDispatcher {
    /// `client` is the `buildctl` executable, either a path or a name to
    /// look up on `PATH`.
    pub fn new(client: impl Into<PathBuf>) -> Self {
        Self {
            client: client.into(),
        }
    }

    /// The `buildctl` arguments for `request`.
    pub fn command_args(request: &BuildRequest) -> Vec<OsString> {
        let recipe_dir = request
            .recipe_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let recipe_file = request
            .recipe_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| crate::defaults::RECIPE_FILE.to_string());

        let mut args: Vec<OsString> = vec![
            "--addr".into(),
            request.daemon_address.clone().into(),
            "build".into(),
            "--frontend".into(),
            "dockerfile.v0".into(),
            "--local".into(),
            local_arg("context", &request.context_path),
            "--local".into(),
            local_arg("dockerfile", recipe_dir),
            "--opt".into(),
            format!("filename={}", recipe_file).into(),
            "--opt".into(),
            format!("platform={}", request.platforms).into(),
            "--output".into(),
            format!(
                "type=image,name={},push={}",
                request.image_tag, request.push
            )
            .into(),
            "--progress".into(),
            "plain".into(),
        ];
        if request.no_cache {
            args.push("--no-cache".into());
        }
        args
    }
}

fn local_arg(name: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(format!("{}=", name));
    arg.push(path.as_os_str());
    arg
}

impl ImageDispatcher for BuildctlDispatcher {
    fn dispatch(
        &self,
        request: &BuildRequest,
        cancel: &CancelToken,
    ) -> Result<DispatchOutcome, BuildError> {
        if !request.context_path.is_dir() {
            return Err(BuildError::MissingInput {
                path: request.context_path.clone(),
            });
        }
        if !request.recipe_path.is_file() {
            return Err(BuildError::MissingInput {
                path: request.recipe_path.clone(),
            });
        }

        info!(
            "Building {} for {}{}",
            request.image_tag,
            request.platforms,
            if request.push { " (push)" } else { "" }
        );
        let started = Instant::now();

        let mut child = Command::new(&self.client)
            .args(Self::command_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::ClientUnavailable {
                client: self.client.display().to_string(),
                message: e.to_string(),
            })?;

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, tx.clone());
        }
        drop(tx);

        let mut tail = VecDeque::with_capacity(OUTPUT_TAIL);
        let mut record = |line: String| {
            debug!("[{}] {}", request.image_tag, line);
            if tail.len() == OUTPUT_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        };

        let status = loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => record(line),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
            }

            if cancel.is_cancelled() {
                abandon(&mut child);
                warn!(
                    "Build of {} was interrupted; the build daemon may still finish it{}",
                    request.image_tag,
                    if request.push {
                        " and push the image"
                    } else {
                        ""
                    }
                );
                return Err(BuildError::Cancelled {
                    tag: request.image_tag.clone(),
                });
            }

            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    abandon(&mut child);
                    return Err(BuildError::Io {
                        tag: request.image_tag.clone(),
                        source,
                    });
                }
            }
        };

        // Readers finish once the pipes close.
        for line in rx.iter() {
            record(line);
        }

        if !status.success() {
            return Err(BuildError::Remote {
                tag: request.image_tag.clone(),
                status: status.to_string(),
                output: tail.into_iter().collect(),
            });
        }

        let duration = started.elapsed();
        info!(
            "Built {} in {:.1}s",
            request.image_tag,
            duration.as_secs_f64()
        );
        Ok(DispatchOutcome {
            image_tag: request.image_tag.clone(),
            pushed: request.push,
            duration,
        })
    }
}

/// Kill the client and reap it so no zombie outlives the dispatch.
fn abandon(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn spawn_line_reader<R: Read + Send + 'static>(source: R, tx: mpsc::Sender<String>) {
    thread::spawn(move || {
        let reader = BufReader::new(source);
        for line in reader.lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}
