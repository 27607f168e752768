//! # Run Output
//!
//! User-facing output of a build run goes through the [`Reporter`] trait.
//! The orchestrator is handed a reporter instead of printing on its own, so
//! tests can capture exactly what a run would have shown. Diagnostic detail
//! (git output, build progress) goes to the `log` facade instead.
//!
//! [`ConsoleReporter`] is the terminal implementation. It decorates lines
//! with emoji when [`OutputConfig`] says the terminal supports color, and
//! prints plain markers otherwise. The color decision respects:
//! - `--color=never|always|auto`
//! - `NO_COLOR` (per https://no-color.org/)
//! - `CLICOLOR=0` and `CLICOLOR_FORCE=1`
//! - `TERM=dumb`

use std::env;
use std::io::{self, Write};

use crate::dispatch::{BuildRequest, DispatchOutcome};
use crate::error::BuildError;
use crate::locator::Action;
use crate::orchestrator::BuildReport;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag value against the environment.
    ///
    /// `always` and `never` win outright; anything else detects support.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    /// `emoji` when colors are enabled, `plain` otherwise.
    pub fn marker<'a>(&self, emoji: &'a str, plain: &'a str) -> &'a str {
        if self.use_color {
            emoji
        } else {
            plain
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Receives the user-visible events of a build run.
pub trait Reporter {
    /// No action changed since the reference.
    fn nothing_to_build(&mut self) -> io::Result<()>;

    /// Dry run: the actions that would be built.
    fn list_actions(&mut self, actions: &[Action]) -> io::Result<()>;

    /// A build is about to be submitted. `index` starts at 1.
    fn building(
        &mut self,
        index: usize,
        total: usize,
        action: &Action,
        request: &BuildRequest,
    ) -> io::Result<()>;

    fn built(&mut self, action: &Action, outcome: &DispatchOutcome) -> io::Result<()>;

    fn build_failed(&mut self, action: &Action, error: &BuildError) -> io::Result<()>;

    /// Actions that will not be attempted in this run.
    fn skipped(&mut self, actions: &[Action], reason: &str) -> io::Result<()>;

    /// All builds have been attempted or abandoned.
    fn finished(&mut self, report: &BuildReport) -> io::Result<()>;
}

/// Reports to a terminal (or any writer).
pub struct ConsoleReporter<W: Write> {
    out: W,
    config: OutputConfig,
    json: bool,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout(config: OutputConfig) -> Self {
        Self::new(io::stdout(), config)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, config: OutputConfig) -> Self {
        Self {
            out,
            config,
            json: false,
        }
    }

    /// Print dry-run listings as a JSON array instead of text.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn nothing_to_build(&mut self) -> io::Result<()> {
        if self.json {
            return writeln!(self.out, "[]");
        }
        writeln!(
            self.out,
            "{} No actions were modified since the provided git reference",
            self.config.marker("✅", "[OK]")
        )
    }

    fn list_actions(&mut self, actions: &[Action]) -> io::Result<()> {
        if self.json {
            serde_json::to_writer_pretty(&mut self.out, actions)?;
            return writeln!(self.out);
        }
        writeln!(
            self.out,
            "{} The following actions were modified and need to be rebuilt:",
            self.config.marker("🔎", "[DRY RUN]")
        )?;
        for action in actions {
            writeln!(self.out, "   {}", action)?;
        }
        Ok(())
    }

    fn building(
        &mut self,
        index: usize,
        total: usize,
        action: &Action,
        request: &BuildRequest,
    ) -> io::Result<()> {
        writeln!(
            self.out,
            "{} [{}/{}] {} -> {}",
            self.config.marker("🔨", "[BUILD]"),
            index,
            total,
            action,
            request.image_tag
        )
    }

    fn built(&mut self, action: &Action, outcome: &DispatchOutcome) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {} {} {} in {:.2}s",
            self.config.marker("✅", "[OK]"),
            action,
            if outcome.pushed { "pushed" } else { "built" },
            outcome.image_tag,
            outcome.duration.as_secs_f64()
        )
    }

    fn build_failed(&mut self, action: &Action, error: &BuildError) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {}: {}",
            self.config.marker("❌", "[FAILED]"),
            action,
            error
        )
    }

    fn skipped(&mut self, actions: &[Action], reason: &str) -> io::Result<()> {
        if actions.is_empty() {
            return Ok(());
        }
        writeln!(
            self.out,
            "{} Skipping {} action(s) {}:",
            self.config.marker("⚠️ ", "[SKIP]"),
            actions.len(),
            reason
        )?;
        for action in actions {
            writeln!(self.out, "   {}", action)?;
        }
        Ok(())
    }

    fn finished(&mut self, report: &BuildReport) -> io::Result<()> {
        writeln!(self.out)?;
        writeln!(
            self.out,
            "{} built, {} failed, {} not attempted",
            report.built.len(),
            report.failed.len(),
            report.not_attempted.len()
        )?;
        for failure in &report.failed {
            writeln!(
                self.out,
                "   {} {} ({})",
                self.config.marker("❌", "-"),
                failure.action,
                failure.image_tag
            )?;
        }
        Ok(())
    }
}
