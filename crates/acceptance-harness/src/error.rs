// crates/acceptance-harness/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error taxonomy shared by fixtures, clients, and the runner.
// Purpose: Classify failures by scenario phase so reports name the kind.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Every fallible harness operation returns [`HarnessError`]. The variant is
//! the failure kind reported per scenario; the payload is the collaborator's
//! message with the step that failed prefixed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Start Errors
// ============================================================================

/// Phase of container start that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartPhase {
    /// The container daemon could not be reached.
    DaemonUnavailable,
    /// Image pull, container create, or container start failed.
    Launch,
    /// The readiness predicate was not satisfied in time.
    Readiness,
    /// The start was cancelled before the container became ready.
    Cancelled,
}

impl StartPhase {
    /// Returns a stable label for reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DaemonUnavailable => "daemon unavailable",
            Self::Launch => "image pull or start",
            Self::Readiness => "readiness",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StartPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Container start failure with the phase that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("container {image} failed during {phase}: {message}")]
pub struct ContainerStartError {
    /// Phase that failed.
    pub phase: StartPhase,
    /// Image reference that was requested.
    pub image: String,
    /// Collaborator message.
    pub message: String,
}

impl ContainerStartError {
    /// Builds a start error for the given phase.
    pub fn new(phase: StartPhase, image: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phase,
            image: image.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Harness Errors
// ============================================================================

/// Failure kinds as they appear in scenario reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Container could not be started or never became ready.
    ContainerStart,
    /// Host or mapped port lookup failed.
    EndpointDiscovery,
    /// Protocol client could not be built or connected.
    ClientSetup,
    /// A scenario expectation was violated.
    Assertion,
    /// Close or terminate reported a failure.
    Teardown,
    /// Harness configuration was invalid.
    Config,
    /// Scenario report could not be written.
    Report,
}

impl FailureKind {
    /// Returns a stable label for reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContainerStart => "container_start",
            Self::EndpointDiscovery => "endpoint_discovery",
            Self::ClientSetup => "client_setup",
            Self::Assertion => "assertion",
            Self::Teardown => "teardown",
            Self::Config => "config",
            Self::Report => "report",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the acceptance harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Container start failed.
    #[error(transparent)]
    ContainerStart(#[from] ContainerStartError),
    /// Endpoint lookup failed after the container became ready.
    #[error("endpoint discovery failed: {0}")]
    EndpointDiscovery(String),
    /// Protocol client setup failed.
    #[error("client setup failed: {0}")]
    ClientSetup(String),
    /// Scenario assertion failed.
    #[error("assertion failed: {0}")]
    Assertion(String),
    /// Close or terminate failed.
    #[error("teardown failed: {0}")]
    Teardown(String),
    /// Harness configuration was invalid.
    #[error("invalid harness config: {0}")]
    Config(String),
    /// Scenario report IO failed.
    #[error("report io failed: {0}")]
    Report(String),
}

impl HarnessError {
    /// Returns the failure kind for reporting.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::ContainerStart(_) => FailureKind::ContainerStart,
            Self::EndpointDiscovery(_) => FailureKind::EndpointDiscovery,
            Self::ClientSetup(_) => FailureKind::ClientSetup,
            Self::Assertion(_) => FailureKind::Assertion,
            Self::Teardown(_) => FailureKind::Teardown,
            Self::Config(_) => FailureKind::Config,
            Self::Report(_) => FailureKind::Report,
        }
    }

    /// Returns the start phase when this is a container start failure.
    #[must_use]
    pub const fn start_phase(&self) -> Option<StartPhase> {
        match self {
            Self::ContainerStart(err) => Some(err.phase),
            _ => None,
        }
    }
}
