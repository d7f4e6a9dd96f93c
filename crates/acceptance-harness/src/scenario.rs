// crates/acceptance-harness/src/scenario.rs
// ============================================================================
// Module: Scenario Runner
// Description: Suite of scenarios with per-scenario setup and teardown.
// Purpose: Guarantee teardown on every exit path and report per scenario.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! A [`Suite`] runs its scenarios strictly in order. Each scenario gets a
//! fresh context `C`, which the `before_each` hook fills, the body uses, and
//! the `after_each` hook drains:
//!
//! 1. setup runs; on error the body is skipped
//! 2. the body runs; errors and panics are captured
//! 3. teardown always runs, then the context is dropped
//!
//! Teardown of scenario N finishes before setup of scenario N+1 begins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::config::HarnessConfig;
use crate::container::ContainerFixture;
use crate::container::ContainerRequest;
use crate::container::ContainerRuntime;
use crate::container::LifecycleState;
use crate::docker::DockerRuntime;
use crate::error::FailureKind;
use crate::error::HarnessError;
use crate::report::RunRoot;
use crate::report::ScenarioReporter;
use crate::timeouts::resolve_timeout;

// ============================================================================
// SECTION: Scenario Environment
// ============================================================================

/// Suite-wide collaborators handed to the setup hook.
#[derive(Clone)]
pub struct ScenarioEnv {
    /// Suite name.
    pub suite: String,
    /// Scenario name.
    pub scenario: String,
    /// Harness configuration.
    pub config: HarnessConfig,
    /// Cancellation shared by every wait in the suite.
    pub cancel: CancelToken,
    /// Container backend.
    pub runtime: Arc<dyn ContainerRuntime>,
}

impl fmt::Debug for ScenarioEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioEnv")
            .field("suite", &self.suite)
            .field("scenario", &self.scenario)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ScenarioEnv {
    /// Starts a container for `request`, applying the configured timeout floor.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ContainerStart`] when the container cannot be
    /// started or never becomes ready.
    pub fn start_container(&self, request: &ContainerRequest) -> Result<ContainerFixture, HarnessError> {
        let timeout = resolve_timeout(request.startup_timeout, self.config.timeout_floor);
        let request = request.clone().with_startup_timeout(timeout);
        Ok(ContainerFixture::start(&self.runtime, &request, &self.cancel)?)
    }
}

// ============================================================================
// SECTION: Teardown
// ============================================================================

/// Whether teardown failures fail an otherwise passing scenario.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeardownPolicy {
    /// Record teardown failures as warnings.
    #[default]
    Warn,
    /// Fail the scenario with a teardown error.
    Fail,
}

/// Collects teardown failures so every teardown step still runs.
#[derive(Debug, Default)]
pub struct TeardownLog {
    /// Failures in the order they occurred.
    failures: Vec<HarnessError>,
}

impl TeardownLog {
    /// Records the result of one teardown step.
    pub fn record(&mut self, step: &str, result: Result<(), HarnessError>) {
        if let Err(err) = result {
            warn!(step, error = %err, "teardown step failed");
            self.failures.push(err);
        }
    }

    /// Returns whether every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Recorded failures.
    #[must_use]
    pub fn failures(&self) -> &[HarnessError] {
        &self.failures
    }

    /// Closes `client` with `close`, then terminates `container`.
    ///
    /// A failed close still terminates the container; both failures are
    /// recorded. Returns the state the container ended in, or `None` when no
    /// container was started.
    pub fn close_then_terminate<T>(
        &mut self,
        client_step: &str,
        client: Option<T>,
        close: impl FnOnce(T) -> Result<(), HarnessError>,
        container: Option<ContainerFixture>,
    ) -> Option<LifecycleState> {
        if let Some(client) = client {
            self.record(client_step, close(client));
        }
        let mut container = container?;
        self.record("terminate container", container.terminate());
        Some(container.lifecycle())
    }
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioStatus {
    /// Setup, body, and (under [`TeardownPolicy::Fail`]) teardown succeeded.
    Passed,
    /// The scenario failed.
    Failed {
        /// Failure kind.
        kind: FailureKind,
        /// Failure message.
        message: String,
    },
}

/// Outcome of one scenario with its teardown warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioOutcome {
    /// Scenario name.
    pub scenario: String,
    /// Pass or failure.
    pub status: ScenarioStatus,
    /// Teardown failures that did not fail the scenario.
    pub teardown_warnings: Vec<String>,
    /// Wall-clock duration including setup and teardown.
    pub duration: Duration,
}

impl ScenarioOutcome {
    /// Returns whether the scenario passed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self.status, ScenarioStatus::Passed)
    }

    /// Failure kind when the scenario failed.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match &self.status {
            ScenarioStatus::Passed => None,
            ScenarioStatus::Failed {
                kind, ..
            } => Some(*kind),
        }
    }
}

impl fmt::Display for ScenarioOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.duration.as_millis();
        match &self.status {
            ScenarioStatus::Passed => write!(f, "PASS {} ({millis} ms)", self.scenario)?,
            ScenarioStatus::Failed {
                kind,
                message,
            } => write!(f, "FAIL {} ({millis} ms) [{kind}] {message}", self.scenario)?,
        }
        for warning in &self.teardown_warnings {
            write!(f, "\n  teardown warning: {warning}")?;
        }
        Ok(())
    }
}

/// Outcomes of every scenario in a suite, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteReport {
    /// Suite name.
    pub suite: String,
    /// Per-scenario outcomes.
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// Returns whether every scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(ScenarioOutcome::passed)
    }

    /// Outcome of the named scenario.
    #[must_use]
    pub fn outcome(&self, scenario: &str) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|outcome| outcome.scenario == scenario)
    }

    /// Converts the report into a test result.
    ///
    /// # Errors
    ///
    /// Returns [`SuiteFailure`] listing every failed scenario.
    pub fn into_result(self) -> Result<(), SuiteFailure> {
        if self.passed() { Ok(()) } else { Err(SuiteFailure(self)) }
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let passed = self.outcomes.iter().filter(|outcome| outcome.passed()).count();
        write!(f, "suite '{}': {passed}/{} passed", self.suite, self.outcomes.len())?;
        for outcome in &self.outcomes {
            write!(f, "\n{outcome}")?;
        }
        Ok(())
    }
}

/// A suite with at least one failed scenario.
#[derive(Error)]
#[error("{0}")]
pub struct SuiteFailure(pub SuiteReport);

// `cargo test` renders a returned error with `Debug`; show the report itself.
impl fmt::Debug for SuiteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// SECTION: Suite
// ============================================================================

/// Setup hook: fills the context from the environment.
type SetupHook<C> = Box<dyn Fn(&mut C, &ScenarioEnv) -> Result<(), HarnessError>>;
/// Teardown hook: drains the context, recording failures.
type TeardownHook<C> = Box<dyn Fn(&mut C, &mut TeardownLog)>;
/// Scenario body.
type ScenarioBody<C> = Box<dyn Fn(&mut C) -> Result<(), HarnessError>>;

/// Ordered scenarios sharing setup and teardown hooks.
pub struct Suite<C> {
    /// Suite name.
    name: String,
    /// Harness configuration.
    config: HarnessConfig,
    /// Container backend.
    runtime: Arc<dyn ContainerRuntime>,
    /// Cancellation shared by every scenario.
    cancel: CancelToken,
    /// Teardown failure policy.
    policy: TeardownPolicy,
    /// Runs before each body.
    before_each: Option<SetupHook<C>>,
    /// Runs after each body, always.
    after_each: Option<TeardownHook<C>>,
    /// Named bodies in registration order.
    scenarios: Vec<(String, ScenarioBody<C>)>,
}

impl<C> fmt::Debug for Suite<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.scenarios.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("scenarios", &names)
            .finish_non_exhaustive()
    }
}

impl<C: Default> Suite<C> {
    /// Creates an empty suite backed by Docker with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: HarnessConfig::default(),
            runtime: Arc::new(DockerRuntime),
            cancel: CancelToken::new(),
            policy: TeardownPolicy::default(),
            before_each: None,
            after_each: None,
            scenarios: Vec::new(),
        }
    }

    /// Replaces the harness configuration.
    #[must_use]
    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the container backend.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<dyn ContainerRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Sets the teardown failure policy.
    #[must_use]
    pub const fn with_teardown_policy(mut self, policy: TeardownPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the setup hook.
    #[must_use]
    pub fn before_each(
        mut self,
        hook: impl Fn(&mut C, &ScenarioEnv) -> Result<(), HarnessError> + 'static,
    ) -> Self {
        self.before_each = Some(Box::new(hook));
        self
    }

    /// Sets the teardown hook.
    #[must_use]
    pub fn after_each(mut self, hook: impl Fn(&mut C, &mut TeardownLog) + 'static) -> Self {
        self.after_each = Some(Box::new(hook));
        self
    }

    /// Appends a scenario.
    #[must_use]
    pub fn scenario(
        mut self,
        name: impl Into<String>,
        body: impl Fn(&mut C) -> Result<(), HarnessError> + 'static,
    ) -> Self {
        self.scenarios.push((name.into(), Box::new(body)));
        self
    }

    /// Token that cancels every launch and readiness wait in the suite.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Runs every scenario in order.
    #[must_use]
    pub fn run(self) -> SuiteReport {
        let span = info_span!("suite", suite = %self.name);
        let _entered = span.enter();
        let run_root = match RunRoot::prepare(&self.config, &self.name) {
            Ok(root) => {
                info!(root = %root.path().display(), "scenario reports enabled");
                Some(root)
            }
            Err(err) => {
                warn!(error = %err, "scenario reports disabled");
                None
            }
        };
        let outcomes = self
            .scenarios
            .iter()
            .map(|(name, body)| self.run_scenario(name, body, run_root.as_ref()))
            .collect();
        let report = SuiteReport {
            suite: self.name.clone(),
            outcomes,
        };
        info!(passed = report.passed(), "suite finished");
        report
    }

    /// Runs one scenario through setup, body, and teardown.
    fn run_scenario(&self, name: &str, body: &ScenarioBody<C>, run_root: Option<&RunRoot>) -> ScenarioOutcome {
        let span = info_span!("scenario", scenario = %name);
        let _entered = span.enter();
        let started = Instant::now();
        let mut reporter = run_root.and_then(|root| {
            root.reporter(&self.name, name)
                .map_err(|err| warn!(error = %err, "scenario report unavailable"))
                .ok()
        });
        let env = ScenarioEnv {
            suite: self.name.clone(),
            scenario: name.to_string(),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            runtime: Arc::clone(&self.runtime),
        };

        let mut context = C::default();
        let setup = match &self.before_each {
            Some(hook) => guarded(HarnessError::ClientSetup, || hook(&mut context, &env)),
            None => Ok(()),
        };
        let result = match setup {
            Ok(()) => {
                info!("scenario body started");
                guarded(HarnessError::Assertion, || body(&mut context))
            }
            Err(err) => {
                error!(error = %err, "scenario setup failed");
                Err(err)
            }
        };

        let mut teardown = TeardownLog::default();
        if let Some(hook) = &self.after_each {
            let hook_result = guarded(HarnessError::Teardown, || {
                hook(&mut context, &mut teardown);
                Ok(())
            });
            teardown.record("after_each", hook_result);
        }
        drop(context);

        let status = self.status(result, &teardown);
        let outcome = ScenarioOutcome {
            scenario: name.to_string(),
            status,
            teardown_warnings: teardown.failures().iter().map(ToString::to_string).collect(),
            duration: started.elapsed(),
        };
        match &outcome.status {
            ScenarioStatus::Passed => info!(duration_ms = outcome.duration.as_millis(), "scenario passed"),
            ScenarioStatus::Failed {
                kind,
                message,
            } => error!(%kind, %message, "scenario failed"),
        }
        if let Some(reporter) = reporter.as_mut() {
            write_summary(reporter, &outcome);
        }
        outcome
    }

    /// Folds the body result and teardown log into a status.
    fn status(&self, result: Result<(), HarnessError>, teardown: &TeardownLog) -> ScenarioStatus {
        match result {
            Err(err) => ScenarioStatus::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
            Ok(()) if self.policy == TeardownPolicy::Fail && !teardown.is_clean() => {
                let message = teardown.failures().iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
                ScenarioStatus::Failed {
                    kind: FailureKind::Teardown,
                    message,
                }
            }
            Ok(()) => ScenarioStatus::Passed,
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs `step`, converting a panic into the failure `on_panic` builds.
///
/// Setup panics surface as client setup failures, body panics as
/// assertions, and teardown panics as teardown failures.
fn guarded(
    on_panic: fn(String) -> HarnessError,
    step: impl FnOnce() -> Result<(), HarnessError>,
) -> Result<(), HarnessError> {
    catch_unwind(AssertUnwindSafe(step))
        .unwrap_or_else(|payload| Err(on_panic(format!("panicked: {}", panic_message(&*payload)))))
}

/// Extracts the message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|msg| (*msg).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Writes the scenario summary, logging IO failures.
fn write_summary(reporter: &mut ScenarioReporter, outcome: &ScenarioOutcome) {
    if let Err(err) = reporter.finish(outcome) {
        warn!(error = %err, "failed to write scenario summary");
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
