// system-tests/src/suites/mod.rs
// ============================================================================
// Module: Suites
// Description: SFTP and Postgres acceptance suites.
// Purpose: Group suite definitions by server under test.
// Dependencies: acceptance-harness
// ============================================================================

//! ## Overview
//! One module per server image. Both tear down through
//! [`acceptance_harness::TeardownLog::close_then_terminate`], so the client
//! session ends before the container and the final container state is kept
//! on the context.

pub mod postgres;
pub mod sftp;
