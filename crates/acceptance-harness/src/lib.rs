// crates/acceptance-harness/src/lib.rs
// ============================================================================
// Module: Acceptance Harness Library
// Description: Container fixtures and the scenario runner for system suites.
// Purpose: Start containers, gate them on readiness, and guarantee teardown.
// Dependencies: testcontainers, tracing, serde, thiserror
// ============================================================================

//! ## Overview
//! The harness runs acceptance scenarios against third-party servers in
//! ephemeral containers:
//!
//! - [`container::ContainerFixture`] launches a container and blocks until its
//!   [`readiness::Readiness`] predicate holds.
//! - [`scenario::Suite`] runs scenarios with per-scenario setup and teardown,
//!   writing one report per scenario through [`report`].
//! - [`docker::DockerRuntime`] is the testcontainers-backed runtime.
//!
//! Host key checks, credentials, and protocol clients live in
//! `acceptance-clients`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod assert;
pub mod cancel;
pub mod config;
pub mod container;
pub mod docker;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod logs;
pub mod readiness;
pub mod report;
pub mod scenario;
pub mod timeouts;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use cancel::CancelToken;
pub use config::HarnessConfig;
pub use container::ContainerFixture;
pub use container::ContainerRequest;
pub use container::ContainerRuntime;
pub use container::LifecycleState;
pub use docker::DockerRuntime;
pub use endpoint::ContainerPort;
pub use endpoint::Endpoint;
pub use error::ContainerStartError;
pub use error::FailureKind;
pub use error::HarnessError;
pub use error::StartPhase;
pub use readiness::Readiness;
pub use scenario::ScenarioEnv;
pub use scenario::Suite;
pub use scenario::SuiteReport;
pub use scenario::TeardownLog;
pub use scenario::TeardownPolicy;
