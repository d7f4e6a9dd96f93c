// system-tests/tests/sftp_server.rs
// ============================================================================
// Module: SFTP Server Suite
// Description: Runs the SFTP acceptance scenarios against Docker.
// Purpose: Verify upload/read-back and teardown after a failed assertion.
// Dependencies: system-tests, acceptance-harness
// ============================================================================

//! ## Overview
//! Docker-backed SFTP scenarios. Built only with `--features system-tests`.

#![allow(
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test-only assertions favor expect for clarity."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use acceptance_harness::FailureKind;
use acceptance_harness::HarnessConfig;
use acceptance_harness::LifecycleState;
use acceptance_harness::Suite;
use acceptance_harness::logging;
use acceptance_harness::scenario::SuiteFailure;
use system_tests::suites::sftp;
use system_tests::suites::sftp::SftpContext;

#[test]
fn sftp_server_suite() -> Result<(), SuiteFailure> {
    logging::init();
    let suite = sftp::suite().expect("harness config");
    suite.run().into_result()
}

#[test]
fn sftp_teardown_runs_after_failed_assertion() {
    logging::init();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&observed);
    let config = HarnessConfig::load().expect("harness config");
    let report = Suite::<SftpContext>::new("SFTP Server teardown")
        .with_config(config)
        .before_each(sftp::setup)
        .after_each(move |ctx, log| {
            sftp::teardown(ctx, log);
            recorder.lock().unwrap_or_else(PoisonError::into_inner).push(ctx.terminated_as);
        })
        .scenario("verify a decoy path", |ctx| sftp::upload_and_verify_decoy(ctx, "/upload/decoy.txt"))
        .run();

    let outcome = report.outcome("verify a decoy path").expect("outcome");
    assert_eq!(outcome.failure_kind(), Some(FailureKind::Assertion), "{report}");
    assert!(outcome.teardown_warnings.is_empty(), "{report}");
    let observed = observed.lock().unwrap_or_else(PoisonError::into_inner).clone();
    assert_eq!(observed, vec![Some(LifecycleState::Terminated)]);
}
