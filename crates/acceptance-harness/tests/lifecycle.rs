// crates/acceptance-harness/tests/lifecycle.rs
// ============================================================================
// Module: Container Lifecycle Tests
// Description: Start, readiness, endpoint, and terminate against a fake runtime.
// Purpose: Pin start-phase classification and exactly-once termination.
// Dependencies: acceptance-harness, helpers
// ============================================================================

//! Container fixture lifecycle tests over the fake runtime.

#![allow(clippy::expect_used, reason = "Test-only assertions favor expect for clarity.")]

mod helpers;

use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use acceptance_harness::CancelToken;
use acceptance_harness::ContainerFixture;
use acceptance_harness::ContainerPort;
use acceptance_harness::ContainerRequest;
use acceptance_harness::FailureKind;
use acceptance_harness::LifecycleState;
use acceptance_harness::Readiness;
use acceptance_harness::StartPhase;

use crate::helpers::fake_runtime::FakeBehavior;
use crate::helpers::fake_runtime::FakeRuntime;
use crate::helpers::fake_runtime::Journal;

const READY_MARKER: &str = "database system is ready to accept connections";

fn log_request(times: usize) -> ContainerRequest {
    ContainerRequest::new("docker.io/postgres:16-alpine", Readiness::log_message(READY_MARKER, times))
        .expect("request")
        .with_exposed_port(ContainerPort::tcp(5432))
        .with_startup_timeout(Duration::from_millis(500))
}

fn marker_behavior(occurrences: usize, hold_open: bool) -> FakeBehavior {
    let mut stderr = vec!["initdb: starting".to_string()];
    for _ in 0 .. occurrences {
        stderr.push(format!("LOG:  {READY_MARKER}"));
    }
    FakeBehavior {
        stderr,
        hold_logs_open: hold_open,
        mapped_port: Some(55432),
        ..FakeBehavior::default()
    }
}

#[test]
fn log_readiness_counts_both_occurrences() {
    let runtime = FakeRuntime::new(marker_behavior(2, true));
    let journal = runtime.journal.clone();
    let runtime = runtime.into_shared();

    let mut fixture =
        ContainerFixture::start(&runtime, &log_request(2), &CancelToken::new()).expect("ready");
    assert_eq!(fixture.lifecycle(), LifecycleState::Ready);
    let state = fixture.state().expect("state");
    assert!(state.running);
    let endpoint = fixture.endpoint(ContainerPort::tcp(5432)).expect("endpoint");
    assert_eq!(endpoint.to_string(), "127.0.0.1:55432");
    assert!(fixture.log_lines().iter().any(|line| line.text.contains(READY_MARKER)));

    fixture.terminate().expect("terminate");
    fixture.terminate().expect("second terminate is a no-op");
    assert_eq!(fixture.lifecycle(), LifecycleState::Terminated);
    assert!(!fixture.state().expect("state").running);
    assert_eq!(journal.count_prefix("remove:"), 1);
}

#[test]
fn single_occurrence_does_not_satisfy_two_when_streams_close() {
    let runtime = FakeRuntime::new(marker_behavior(1, false));
    let journal = runtime.journal.clone();
    let runtime = runtime.into_shared();

    let err = ContainerFixture::start(&runtime, &log_request(2), &CancelToken::new())
        .expect_err("one occurrence is not two");
    assert_eq!(err.phase, StartPhase::Readiness);
    assert!(err.message.contains("1 of 2"), "{}", err.message);
    assert!(err.message.contains("last log lines"), "{}", err.message);
    assert_eq!(journal.count_prefix("remove:"), 1, "failed container must be removed");
}

#[test]
fn single_occurrence_does_not_satisfy_two_before_timeout() {
    let runtime = FakeRuntime::new(marker_behavior(1, true)).into_shared();
    let started = Instant::now();
    let err = ContainerFixture::start(&runtime, &log_request(2), &CancelToken::new())
        .expect_err("strict count");
    assert_eq!(err.phase, StartPhase::Readiness);
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert!(err.message.contains("within 500 ms"), "{}", err.message);
}

#[test]
fn daemon_unavailable_is_its_own_phase() {
    let runtime = FakeRuntime::new(FakeBehavior {
        unavailable: Some("cannot connect to the docker daemon".to_string()),
        ..FakeBehavior::default()
    });
    let journal = runtime.journal.clone();
    let err = ContainerFixture::start(&runtime.into_shared(), &log_request(1), &CancelToken::new())
        .expect_err("no daemon");
    assert_eq!(err.phase, StartPhase::DaemonUnavailable);
    assert!(journal.events().is_empty());
}

#[test]
fn launch_failure_reports_launch_phase() {
    let runtime = FakeRuntime::new(FakeBehavior {
        launch_error: Some("pull access denied for nonexistent.invalid/app".to_string()),
        ..FakeBehavior::default()
    })
    .into_shared();
    let err = ContainerFixture::start(&runtime, &log_request(1), &CancelToken::new())
        .expect_err("launch fails");
    assert_eq!(err.phase, StartPhase::Launch);
    assert!(err.message.contains("pull access denied"));
    let harness_err = acceptance_harness::HarnessError::from(err);
    assert_eq!(harness_err.kind(), FailureKind::ContainerStart);
    assert_eq!(harness_err.start_phase(), Some(StartPhase::Launch));
}

#[test]
fn slow_launch_is_bounded_and_orphan_removed() {
    let journal = Journal::default();
    let runtime = FakeRuntime::with_journal(
        FakeBehavior {
            launch_delay: Duration::from_millis(800),
            ..marker_behavior(1, false)
        },
        journal.clone(),
    )
    .into_shared();
    let request = log_request(1).with_launch_timeout(Duration::from_millis(200));

    let started = Instant::now();
    let err = ContainerFixture::start(&runtime, &request, &CancelToken::new()).expect_err("budget");
    assert_eq!(err.phase, StartPhase::Launch);
    assert!(started.elapsed() < Duration::from_millis(700));

    let deadline = Instant::now() + Duration::from_secs(5);
    while journal.count_prefix("remove:") == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
    }
    assert_eq!(journal.count_prefix("launch:"), 1);
    assert_eq!(journal.count_prefix("remove:"), 1, "late container must be reaped");
}

#[test]
fn cancellation_stops_readiness_wait() {
    let runtime = FakeRuntime::new(marker_behavior(0, true)).into_shared();
    let cancel = CancelToken::new();
    let request = log_request(1).with_startup_timeout(Duration::from_secs(30));
    let canceller = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            cancel.cancel();
        })
    };
    let started = Instant::now();
    let err = ContainerFixture::start(&runtime, &request, &cancel).expect_err("cancelled");
    canceller.join().expect("canceller");
    assert_eq!(err.phase, StartPhase::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn listening_port_readiness_uses_mapped_port() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let server = thread::spawn(move || {
        let (conn, _) = listener.accept().expect("accept");
        thread::sleep(Duration::from_millis(500));
        drop(conn);
    });
    let runtime = FakeRuntime::new(FakeBehavior {
        mapped_port: Some(port),
        ..FakeBehavior::default()
    })
    .into_shared();
    let request = ContainerRequest::new("atmoz/sftp", Readiness::listening_port(ContainerPort::tcp(22)))
        .expect("request")
        .with_exposed_port(ContainerPort::tcp(22))
        .with_startup_timeout(Duration::from_secs(10));

    let mut fixture = ContainerFixture::start(&runtime, &request, &CancelToken::new()).expect("ready");
    assert_eq!(fixture.mapped_port(ContainerPort::tcp(22)).expect("port"), port);
    assert_eq!(fixture.host().expect("host"), "127.0.0.1");
    fixture.terminate().expect("terminate");
    server.join().expect("server");
}

#[test]
fn endpoints_refused_after_terminate() {
    let runtime = FakeRuntime::new(marker_behavior(1, true)).into_shared();
    let mut fixture =
        ContainerFixture::start(&runtime, &log_request(1), &CancelToken::new()).expect("ready");
    fixture.terminate().expect("terminate");
    let err = fixture.endpoint(ContainerPort::tcp(5432)).expect_err("terminated");
    assert_eq!(err.kind(), FailureKind::EndpointDiscovery);
}

#[test]
fn remove_failure_is_a_teardown_error_and_not_retried() {
    let runtime = FakeRuntime::new(FakeBehavior {
        remove_error: Some("container already gone".to_string()),
        ..marker_behavior(1, true)
    });
    let journal = runtime.journal.clone();
    let mut fixture = ContainerFixture::start(&runtime.into_shared(), &log_request(1), &CancelToken::new())
        .expect("ready");
    let err = fixture.terminate().expect_err("remove fails");
    assert_eq!(err.kind(), FailureKind::Teardown);
    assert_eq!(fixture.lifecycle(), LifecycleState::Terminated);
    fixture.terminate().expect("idempotent");
    drop(fixture);
    assert_eq!(journal.count_prefix("remove:"), 1);
}

#[test]
fn dropped_fixture_is_terminated() {
    let runtime = FakeRuntime::new(marker_behavior(1, true));
    let journal = runtime.journal.clone();
    let fixture = ContainerFixture::start(&runtime.into_shared(), &log_request(1), &CancelToken::new())
        .expect("ready");
    drop(fixture);
    assert_eq!(journal.count_prefix("remove:"), 1);
}
