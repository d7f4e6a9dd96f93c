// crates/acceptance-harness/src/container.rs
// ============================================================================
// Module: Container Fixture
// Description: Container requests, runtime seam, and the lifecycle handle.
// Purpose: Start a container, wait for readiness, expose endpoints, and
//          guarantee termination on every exit path.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! [`ContainerFixture::start`] drives a [`ContainerRequest`] through the
//! lifecycle `Requested → Starting → Ready`, failing with a
//! [`ContainerStartError`] that names the phase. Endpoints are only handed out
//! in the `Ready` state, so no client can be built before readiness holds.
//!
//! Termination is idempotent. [`ContainerFixture::terminate`] is the explicit
//! teardown path; `Drop` terminates anything still running as a backstop.
//!
//! The orchestrator sits behind [`ContainerRuntime`] / [`LaunchedContainer`];
//! production code uses [`crate::docker::DockerRuntime`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::mpsc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::endpoint::ContainerPort;
use crate::endpoint::Endpoint;
use crate::error::ContainerStartError;
use crate::error::HarnessError;
use crate::error::StartPhase;
use crate::logs::LogLine;
use crate::logs::LogSink;
use crate::logs::LogSource;
use crate::logs::LogStream;
use crate::readiness::Readiness;
use crate::readiness::ReadinessFailure;
use crate::readiness::wait_for_listening;
use crate::timeouts::deadline_after;
use crate::timeouts::deadline_passed;
use crate::timeouts::next_wait;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default readiness budget when a request does not set one.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
/// Default budget for image pull, create, and start.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(300);
/// Poll interval while waiting for the launch worker.
const LAUNCH_POLL: Duration = Duration::from_millis(100);
/// Log lines attached to readiness failures.
const FAILURE_LOG_TAIL: usize = 20;

// ============================================================================
// SECTION: Image References
// ============================================================================

/// Image reference split into repository name and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Repository, including any registry prefix (`docker.io/postgres`).
    pub name: String,
    /// Tag; `latest` when the reference omitted one.
    pub tag: String,
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

impl FromStr for ImageRef {
    type Err = HarnessError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() || raw.contains(char::is_whitespace) || raw.contains('@') {
            return Err(HarnessError::Config(format!("invalid image reference '{raw}'")));
        }
        let last_segment_start = raw.rfind('/').map_or(0, |idx| idx + 1);
        let (name, tag) = match raw[last_segment_start ..].rfind(':') {
            Some(offset) => {
                let split = last_segment_start + offset;
                (&raw[.. split], &raw[split + 1 ..])
            }
            None => (raw, "latest"),
        };
        if name.is_empty() || tag.is_empty() || name.ends_with('/') {
            return Err(HarnessError::Config(format!("invalid image reference '{raw}'")));
        }
        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Declarative description of the container a scenario needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    /// Image to run.
    pub image: ImageRef,
    /// Ports exposed inside the container.
    pub exposed_ports: Vec<ContainerPort>,
    /// Environment bindings.
    pub env: BTreeMap<String, String>,
    /// Predicate that marks the container ready.
    pub readiness: Readiness,
    /// Budget for the readiness predicate.
    pub startup_timeout: Duration,
    /// Budget for image pull, create, and start.
    pub launch_timeout: Duration,
}

impl ContainerRequest {
    /// Starts a request for `image` gated on `readiness`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when the image reference is invalid.
    pub fn new(image: &str, readiness: Readiness) -> Result<Self, HarnessError> {
        Ok(Self {
            image: image.parse()?,
            exposed_ports: Vec::new(),
            env: BTreeMap::new(),
            readiness,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
        })
    }

    /// Exposes a container port.
    #[must_use]
    pub fn with_exposed_port(mut self, port: ContainerPort) -> Self {
        if !self.exposed_ports.contains(&port) {
            self.exposed_ports.push(port);
        }
        self
    }

    /// Adds an environment binding.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    /// Sets the readiness budget.
    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Sets the pull/create/start budget.
    #[must_use]
    pub const fn with_launch_timeout(mut self, timeout: Duration) -> Self {
        self.launch_timeout = timeout;
        self
    }
}

// ============================================================================
// SECTION: Runtime Seam
// ============================================================================

/// Error reported by a container runtime backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RuntimeError {
    /// Backend message.
    pub message: String,
}

impl RuntimeError {
    /// Wraps a backend message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A running container owned by a backend.
pub trait LaunchedContainer: Send {
    /// Backend container identifier.
    fn id(&self) -> String;

    /// Host on which mapped ports are reachable.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the backend cannot resolve the host.
    fn host(&self) -> Result<String, RuntimeError>;

    /// Host-side port bound to `port`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the port is not mapped.
    fn mapped_port(&self, port: ContainerPort) -> Result<u16, RuntimeError>;

    /// Whether the container process is running.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the backend cannot inspect the container.
    fn is_running(&self) -> Result<bool, RuntimeError>;

    /// Followed stdout and stderr streams, starting at container start.
    fn log_streams(&self) -> Vec<(LogSource, LogStream)>;

    /// Stops and removes the container.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when removal fails.
    fn remove(self: Box<Self>) -> Result<(), RuntimeError>;
}

/// Backend able to launch containers.
pub trait ContainerRuntime: Send + Sync {
    /// Reports whether the backend daemon is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] describing why the daemon is unavailable.
    fn ensure_available(&self) -> Result<(), RuntimeError>;

    /// Pulls (if needed), creates, and starts a container for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when any of those steps fails.
    fn launch(&self, request: &ContainerRequest) -> Result<Box<dyn LaunchedContainer>, RuntimeError>;
}

// ============================================================================
// SECTION: Lifecycle
// ============================================================================

/// Lifecycle state of a container handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Request accepted, nothing launched yet.
    Requested,
    /// Launched; readiness pending.
    Starting,
    /// Readiness predicate satisfied.
    Ready,
    /// Start failed.
    Failed,
    /// Termination in progress.
    Terminating,
    /// Container removed.
    Terminated,
}

impl LifecycleState {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot returned by [`ContainerFixture::state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    /// Backend container identifier.
    pub id: String,
    /// Whether the container process is running.
    pub running: bool,
    /// Harness lifecycle state.
    pub lifecycle: LifecycleState,
}

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// A ready container exclusively owned by one scenario.
pub struct ContainerFixture {
    /// Image the container runs.
    image: ImageRef,
    /// Backend id, kept after removal for reports.
    id: String,
    /// Backend handle; `None` once terminated.
    inner: Option<Box<dyn LaunchedContainer>>,
    /// Current lifecycle state.
    lifecycle: LifecycleState,
    /// Captured stdout/stderr.
    logs: LogSink,
}

impl fmt::Debug for ContainerFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerFixture")
            .field("image", &self.image)
            .field("id", &self.id)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl ContainerFixture {
    /// Launches a container and blocks until its readiness predicate holds.
    ///
    /// A container that launched but failed readiness is removed before the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerStartError`] naming the failed phase.
    pub fn start(
        runtime: &Arc<dyn ContainerRuntime>,
        request: &ContainerRequest,
        cancel: &CancelToken,
    ) -> Result<Self, ContainerStartError> {
        let image = request.image.to_string();
        let mut lifecycle = LifecycleState::Requested;
        info!(%image, state = %lifecycle, readiness = %request.readiness, "container requested");

        runtime
            .ensure_available()
            .map_err(|err| ContainerStartError::new(StartPhase::DaemonUnavailable, &image, err.message))?;
        let launched = launch_with_budget(runtime, request, cancel)?;
        lifecycle = LifecycleState::Starting;
        let id = launched.id();
        info!(%image, %id, state = %lifecycle, "container launched");

        let mut fixture = Self {
            image: request.image.clone(),
            id,
            logs: LogSink::follow(launched.log_streams()),
            inner: Some(launched),
            lifecycle,
        };
        match fixture.await_readiness(request, cancel) {
            Ok(()) => {
                fixture.lifecycle = LifecycleState::Ready;
                info!(%image, id = %fixture.id, state = %fixture.lifecycle, "container ready");
                Ok(fixture)
            }
            Err(failure) => {
                fixture.lifecycle = LifecycleState::Failed;
                let phase = if failure == ReadinessFailure::Cancelled {
                    StartPhase::Cancelled
                } else {
                    StartPhase::Readiness
                };
                let message = with_log_tail(failure.to_string(), &fixture.logs.tail(FAILURE_LOG_TAIL));
                warn!(%image, id = %fixture.id, %phase, error = %failure, "container not ready");
                if let Err(err) = fixture.terminate() {
                    warn!(%image, error = %err, "failed to remove container after start failure");
                }
                Err(ContainerStartError::new(phase, image, message))
            }
        }
    }

    /// Evaluates the readiness predicate against the launched container.
    fn await_readiness(
        &self,
        request: &ContainerRequest,
        cancel: &CancelToken,
    ) -> Result<(), ReadinessFailure> {
        match &request.readiness {
            Readiness::ListeningPort(port) => {
                let endpoint = self.raw_endpoint(*port).map_err(|err| ReadinessFailure::PortTimeout {
                    endpoint: port.to_string(),
                    timeout_ms: 0,
                    last_error: err.to_string(),
                })?;
                wait_for_listening(&endpoint, request.startup_timeout, cancel)
            }
            Readiness::LogMessage(matcher) => self
                .logs
                .wait_for_occurrences(&matcher.needle, matcher.times, request.startup_timeout, cancel)
                .map(|_| ()),
        }
    }

    /// Returns the backend handle if the container is not yet terminated.
    fn launched(&self) -> Result<&dyn LaunchedContainer, HarnessError> {
        self.inner.as_deref().ok_or_else(|| {
            HarnessError::EndpointDiscovery(format!("container {} is {}", self.id, self.lifecycle))
        })
    }

    /// Resolves an endpoint without checking the lifecycle state.
    fn raw_endpoint(&self, port: ContainerPort) -> Result<Endpoint, HarnessError> {
        let launched = self.launched()?;
        let host = launched
            .host()
            .map_err(|err| HarnessError::EndpointDiscovery(format!("host lookup failed: {err}")))?;
        let mapped = launched.mapped_port(port).map_err(|err| {
            HarnessError::EndpointDiscovery(format!("mapped port lookup for {port} failed: {err}"))
        })?;
        Ok(Endpoint::new(host, mapped))
    }

    /// Refuses endpoint access outside the `Ready` state.
    fn require_ready(&self) -> Result<(), HarnessError> {
        if self.lifecycle == LifecycleState::Ready {
            Ok(())
        } else {
            Err(HarnessError::EndpointDiscovery(format!(
                "container {} is {}, not ready",
                self.id, self.lifecycle
            )))
        }
    }

    /// Host on which mapped ports are reachable.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::EndpointDiscovery`] when not ready or lookup fails.
    pub fn host(&self) -> Result<String, HarnessError> {
        self.require_ready()?;
        self.launched()?
            .host()
            .map_err(|err| HarnessError::EndpointDiscovery(format!("host lookup failed: {err}")))
    }

    /// Host-side port bound to `port`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::EndpointDiscovery`] when not ready or lookup fails.
    pub fn mapped_port(&self, port: ContainerPort) -> Result<u16, HarnessError> {
        self.require_ready()?;
        self.launched()?.mapped_port(port).map_err(|err| {
            HarnessError::EndpointDiscovery(format!("mapped port lookup for {port} failed: {err}"))
        })
    }

    /// Host and mapped port for `port`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::EndpointDiscovery`] when not ready or lookup fails.
    pub fn endpoint(&self, port: ContainerPort) -> Result<Endpoint, HarnessError> {
        self.require_ready()?;
        let endpoint = self.raw_endpoint(port)?;
        info!(id = %self.id, %port, %endpoint, "endpoint mapped");
        Ok(endpoint)
    }

    /// Inspects the container.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::EndpointDiscovery`] when the backend cannot
    /// inspect a live container.
    pub fn state(&self) -> Result<ContainerState, HarnessError> {
        let running = match &self.inner {
            Some(launched) => launched.is_running().map_err(|err| {
                HarnessError::EndpointDiscovery(format!("state lookup failed: {err}"))
            })?,
            None => false,
        };
        Ok(ContainerState {
            id: self.id.clone(),
            running,
            lifecycle: self.lifecycle,
        })
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    /// Backend container identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Image the container runs.
    #[must_use]
    pub const fn image(&self) -> &ImageRef {
        &self.image
    }

    /// Snapshot of the captured stdout/stderr lines.
    #[must_use]
    pub fn log_lines(&self) -> Vec<LogLine> {
        self.logs.lines()
    }

    /// Stops and removes the container. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Teardown`] when the backend fails to remove it.
    /// The handle is `Terminated` afterwards either way; removal is not retried.
    pub fn terminate(&mut self) -> Result<(), HarnessError> {
        let Some(launched) = self.inner.take() else {
            return Ok(());
        };
        self.lifecycle = LifecycleState::Terminating;
        let result = launched.remove();
        self.lifecycle = LifecycleState::Terminated;
        match result {
            Ok(()) => {
                info!(id = %self.id, state = %self.lifecycle, "container terminated");
                Ok(())
            }
            Err(err) => Err(HarnessError::Teardown(format!(
                "failed to terminate container {}: {err}",
                self.id
            ))),
        }
    }
}

impl Drop for ContainerFixture {
    fn drop(&mut self) {
        if self.inner.is_none() {
            return;
        }
        warn!(id = %self.id, state = %self.lifecycle, "container dropped without terminate");
        if let Err(err) = self.terminate() {
            warn!(id = %self.id, error = %err, "backstop terminate failed");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs `launch` on a worker thread bounded by the request's launch budget.
///
/// A container that arrives after the caller gave up is removed by the worker.
fn launch_with_budget(
    runtime: &Arc<dyn ContainerRuntime>,
    request: &ContainerRequest,
    cancel: &CancelToken,
) -> Result<Box<dyn LaunchedContainer>, ContainerStartError> {
    let image = request.image.to_string();
    let (tx, rx) = mpsc::channel();
    let worker_runtime = Arc::clone(runtime);
    let worker_request = request.clone();
    thread::Builder::new()
        .name("container-launch".to_string())
        .spawn(move || {
            let result = worker_runtime.launch(&worker_request);
            if let Err(mpsc::SendError(Ok(orphan))) = tx.send(result) {
                let id = orphan.id();
                if let Err(err) = orphan.remove() {
                    warn!(%id, error = %err, "failed to remove container launched after deadline");
                }
            }
        })
        .map_err(|err| ContainerStartError::new(StartPhase::Launch, &image, err.to_string()))?;

    let deadline = deadline_after(request.launch_timeout);
    loop {
        if cancel.is_cancelled() {
            return Err(ContainerStartError::new(StartPhase::Cancelled, &image, "launch cancelled"));
        }
        let now = Instant::now();
        if deadline_passed(deadline, now) {
            return Err(ContainerStartError::new(
                StartPhase::Launch,
                &image,
                format!("launch exceeded {} ms", request.launch_timeout.as_millis()),
            ));
        }
        match rx.recv_timeout(next_wait(deadline, now, LAUNCH_POLL)) {
            Ok(Ok(launched)) => return Ok(launched),
            Ok(Err(err)) => {
                return Err(ContainerStartError::new(StartPhase::Launch, &image, err.message));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(ContainerStartError::new(
                    StartPhase::Launch,
                    &image,
                    "launch worker exited without a result",
                ));
            }
        }
    }
}

/// Appends the captured log tail to a failure message.
fn with_log_tail(message: String, tail: &[LogLine]) -> String {
    if tail.is_empty() {
        return message;
    }
    let mut out = message;
    out.push_str("; last log lines:");
    for line in tail {
        out.push_str("\n  [");
        out.push_str(&line.source.to_string());
        out.push_str("] ");
        out.push_str(&line.text);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "Test-only assertions favor expect for clarity.")]

    use std::time::Duration;

    use super::ContainerRequest;
    use super::ImageRef;
    use crate::endpoint::ContainerPort;
    use crate::readiness::Readiness;

    #[test]
    fn image_ref_splits_tag_after_last_slash() {
        let image: ImageRef = "docker.io/postgres:16-alpine".parse().expect("image");
        assert_eq!(image.name, "docker.io/postgres");
        assert_eq!(image.tag, "16-alpine");

        let image: ImageRef = "atmoz/sftp".parse().expect("image");
        assert_eq!(image.to_string(), "atmoz/sftp:latest");

        let image: ImageRef = "localhost:5000/team/app".parse().expect("image");
        assert_eq!(image.name, "localhost:5000/team/app");
        assert_eq!(image.tag, "latest");
    }

    #[test]
    fn image_ref_rejects_malformed() {
        for raw in ["", "  ", "postgres:", "registry/", "img@sha256:abc", "a b"] {
            assert!(raw.parse::<ImageRef>().is_err(), "{raw}");
        }
    }

    #[test]
    fn request_builder_dedupes_ports_and_keeps_env() {
        let request = ContainerRequest::new("atmoz/sftp", Readiness::listening_port(ContainerPort::tcp(22)))
            .expect("request")
            .with_exposed_port(ContainerPort::tcp(22))
            .with_exposed_port(ContainerPort::tcp(22))
            .with_env("SFTP_USERS", "foo:pass:::upload")
            .with_startup_timeout(Duration::from_secs(10));
        assert_eq!(request.exposed_ports, vec![ContainerPort::tcp(22)]);
        assert_eq!(request.env.get("SFTP_USERS").map(String::as_str), Some("foo:pass:::upload"));
        assert_eq!(request.startup_timeout, Duration::from_secs(10));
    }
}
