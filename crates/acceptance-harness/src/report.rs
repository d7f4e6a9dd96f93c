// crates/acceptance-harness/src/report.rs
// ============================================================================
// Module: Scenario Reports
// Description: Per-scenario artifact directories and summaries.
// Purpose: Leave a human-readable and machine-readable record per scenario.
// Dependencies: serde, serde_jcs
// ============================================================================

//! ## Overview
//! Each suite run gets a root (`target/acceptance/run_<ms>/<suite>` unless
//! configured) and each scenario a directory beneath it holding
//! `summary.json` (canonical JSON) and `summary.md`. A reporter dropped
//! without an explicit finish still writes a summary marked `panic` or
//! `unknown`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::config::HarnessConfig;
use crate::error::FailureKind;
use crate::error::HarnessError;
use crate::scenario::ScenarioOutcome;
use crate::scenario::ScenarioStatus;

// ============================================================================
// SECTION: Summary Types
// ============================================================================

/// Serialized scenario summary.
#[derive(Debug, Serialize)]
struct ScenarioSummary {
    /// Suite name.
    suite: String,
    /// Scenario name.
    scenario: String,
    /// `pass`, `fail`, `panic`, or `unknown`.
    status: String,
    /// Failure kind when the scenario failed.
    failure_kind: Option<FailureKind>,
    /// Failure message when the scenario failed.
    failure_message: Option<String>,
    /// Teardown warnings.
    teardown_warnings: Vec<String>,
    /// Start time, ms since the epoch.
    started_at_ms: u128,
    /// End time, ms since the epoch.
    ended_at_ms: u128,
    /// Wall-clock duration.
    duration_ms: u128,
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

/// Maps a name to a filesystem-safe directory component.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if cleaned.is_empty() { "unnamed".to_string() } else { cleaned }
}

/// Maps an IO error into a report error.
fn report_error(path: &Path, err: impl std::fmt::Display) -> HarnessError {
    HarnessError::Report(format!("{}: {err}", path.display()))
}

// ============================================================================
// SECTION: Run Root
// ============================================================================

/// Report directory for one suite run.
#[derive(Debug, Clone)]
pub struct RunRoot {
    /// Suite directory.
    root: PathBuf,
}

impl RunRoot {
    /// Creates the suite directory.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when a configured root already holds
    /// reports for this suite and overwriting is not allowed, or
    /// [`HarnessError::Report`] when the directory cannot be created.
    pub fn prepare(config: &HarnessConfig, suite: &str) -> Result<Self, HarnessError> {
        let base = config.run_root.clone().unwrap_or_else(|| {
            PathBuf::from("target/acceptance").join(format!("run_{}", now_millis()))
        });
        let root = base.join(sanitize(suite));
        let occupied = fs::read_dir(&root).is_ok_and(|mut entries| entries.next().is_some());
        if occupied && !config.allow_overwrite {
            return Err(HarnessError::Config(format!(
                "run root {} is not empty; set ACCEPTANCE_ALLOW_OVERWRITE=1 to reuse it",
                root.display()
            )));
        }
        fs::create_dir_all(&root).map_err(|err| report_error(&root, err))?;
        Ok(Self {
            root,
        })
    }

    /// Suite directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates the reporter for one scenario.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Report`] when the scenario directory cannot be
    /// created.
    pub fn reporter(&self, suite: &str, scenario: &str) -> Result<ScenarioReporter, HarnessError> {
        let dir = self.root.join(sanitize(scenario));
        fs::create_dir_all(&dir).map_err(|err| report_error(&dir, err))?;
        Ok(ScenarioReporter {
            artifacts: ScenarioArtifacts {
                root: dir,
            },
            suite: suite.to_string(),
            scenario: scenario.to_string(),
            started_at_ms: now_millis(),
            finalized: false,
        })
    }
}

// ============================================================================
// SECTION: Artifacts
// ============================================================================

/// Artifact directory for a single scenario.
#[derive(Debug, Clone)]
pub struct ScenarioArtifacts {
    /// Scenario directory.
    root: PathBuf,
}

impl ScenarioArtifacts {
    /// Scenario directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a JSON artifact using canonical JCS serialization.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Report`] on serialization or IO failure.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, HarnessError> {
        let path = self.root.join(name);
        let bytes = serde_jcs::to_vec(value).map_err(|err| report_error(&path, err))?;
        fs::write(&path, bytes).map_err(|err| report_error(&path, err))?;
        Ok(path)
    }

    /// Writes a UTF-8 text artifact.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Report`] on IO failure.
    pub fn write_text(&self, name: &str, value: &str) -> Result<PathBuf, HarnessError> {
        let path = self.root.join(name);
        fs::write(&path, value.as_bytes()).map_err(|err| report_error(&path, err))?;
        Ok(path)
    }
}

// ============================================================================
// SECTION: Reporter
// ============================================================================

/// Writes the summary for one scenario, even when the scenario panics.
#[derive(Debug)]
pub struct ScenarioReporter {
    /// Scenario artifact directory.
    artifacts: ScenarioArtifacts,
    /// Suite name.
    suite: String,
    /// Scenario name.
    scenario: String,
    /// Start time, ms since the epoch.
    started_at_ms: u128,
    /// Whether a summary was written.
    finalized: bool,
}

impl ScenarioReporter {
    /// Scenario artifact directory.
    #[must_use]
    pub const fn artifacts(&self) -> &ScenarioArtifacts {
        &self.artifacts
    }

    /// Writes the final summary for `outcome`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Report`] when a summary file cannot be written.
    pub fn finish(&mut self, outcome: &ScenarioOutcome) -> Result<(), HarnessError> {
        let (status, failure_kind, failure_message) = match &outcome.status {
            ScenarioStatus::Passed => ("pass", None, None),
            ScenarioStatus::Failed {
                kind,
                message,
            } => ("fail", Some(*kind), Some(message.clone())),
        };
        self.write(status, failure_kind, failure_message, outcome.teardown_warnings.clone())
    }

    /// Serializes and writes both summary files.
    fn write(
        &mut self,
        status: &str,
        failure_kind: Option<FailureKind>,
        failure_message: Option<String>,
        teardown_warnings: Vec<String>,
    ) -> Result<(), HarnessError> {
        let ended_at_ms = now_millis();
        let summary = ScenarioSummary {
            suite: self.suite.clone(),
            scenario: self.scenario.clone(),
            status: status.to_string(),
            failure_kind,
            failure_message,
            teardown_warnings,
            started_at_ms: self.started_at_ms,
            ended_at_ms,
            duration_ms: ended_at_ms.saturating_sub(self.started_at_ms),
        };
        self.artifacts.write_json("summary.json", &summary)?;
        self.artifacts.write_text("summary.md", &summary_markdown(&summary))?;
        self.finalized = true;
        Ok(())
    }
}

impl Drop for ScenarioReporter {
    fn drop(&mut self) {
        if self.finalized {
            return;
        }
        let status = if std::thread::panicking() { "panic" } else { "unknown" };
        let _ = self.write(
            status,
            None,
            Some("scenario terminated without explicit summary".to_string()),
            Vec::new(),
        );
    }
}

/// Renders the Markdown summary.
fn summary_markdown(summary: &ScenarioSummary) -> String {
    let mut out = String::new();
    out.push_str("# Scenario Summary\n\n");
    out.push_str("## Status\n\n");
    let _ = writeln!(out, "- Suite: {}", summary.suite);
    let _ = writeln!(out, "- Scenario: {}", summary.scenario);
    let _ = writeln!(out, "- Status: {}", summary.status);
    let _ = writeln!(out, "- Duration (ms): {}", summary.duration_ms);
    if let Some(kind) = summary.failure_kind {
        let _ = writeln!(out, "- Failure kind: {kind}");
    }
    if let Some(message) = &summary.failure_message {
        let _ = writeln!(out, "\n## Failure\n\n```text\n{message}\n```");
    }
    out.push_str("\n## Teardown Warnings\n\n");
    if summary.teardown_warnings.is_empty() {
        out.push_str("- None\n");
    } else {
        for warning in &summary.teardown_warnings {
            let _ = writeln!(out, "- {warning}");
        }
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
