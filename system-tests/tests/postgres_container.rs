// system-tests/tests/postgres_container.rs
// ============================================================================
// Module: Postgres Container Suite
// Description: Runs the Postgres acceptance scenarios against Docker.
// Purpose: Verify liveness, a table round trip, and start failure reporting.
// Dependencies: system-tests, acceptance-harness
// ============================================================================

//! ## Overview
//! Docker-backed Postgres scenarios. Built only with `--features system-tests`.

#![allow(
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor expect for clarity."
)]

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use acceptance_harness::CancelToken;
use acceptance_harness::ContainerFixture;
use acceptance_harness::ContainerRequest;
use acceptance_harness::ContainerRuntime;
use acceptance_harness::DockerRuntime;
use acceptance_harness::Readiness;
use acceptance_harness::StartPhase;
use acceptance_harness::logging;
use acceptance_harness::scenario::SuiteFailure;
use system_tests::suites::postgres;

fn docker() -> Arc<dyn ContainerRuntime> {
    Arc::new(DockerRuntime)
}

#[test]
fn postgres_container_suite() -> Result<(), SuiteFailure> {
    logging::init();
    let suite = postgres::suite().expect("harness config");
    suite.run().into_result()
}

#[test]
fn readiness_requires_every_marker_occurrence() {
    logging::init();
    let request = postgres::container_request(postgres::READY_OCCURRENCES + 1).expect("request");
    let err = ContainerFixture::start(&docker(), &request, &CancelToken::new())
        .expect_err("the image never logs the marker three times");
    assert_eq!(err.phase, StartPhase::Readiness, "{err}");
}

#[test]
fn unreachable_registry_fails_within_launch_budget() {
    logging::init();
    let budget = Duration::from_secs(60);
    let request = ContainerRequest::new(
        "registry.nonexistent.invalid/postgres:16-alpine",
        Readiness::log_message(postgres::READY_MARKER, postgres::READY_OCCURRENCES),
    )
    .expect("request")
    .with_exposed_port(postgres::PG_PORT)
    .with_launch_timeout(budget);

    let started = Instant::now();
    let err = ContainerFixture::start(&docker(), &request, &CancelToken::new())
        .expect_err("image cannot be pulled");
    assert_eq!(err.phase, StartPhase::Launch, "{err}");
    assert!(started.elapsed() < budget + Duration::from_secs(5));
}
