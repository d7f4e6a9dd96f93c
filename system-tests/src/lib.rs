// system-tests/src/lib.rs
// ============================================================================
// Module: Container Acceptance Suites Library
// Description: Suite definitions for the SFTP and Postgres acceptance tests.
// Purpose: Keep container requests, contexts, and scenario bodies testable
//          apart from the docker-backed test binaries.
// Dependencies: acceptance-harness, acceptance-clients
// ============================================================================

//! ## Overview
//! Each suite module exposes its container request, its scenario context, the
//! setup and teardown hooks, and the scenario bodies. `suite()` wires them
//! into an [`acceptance_harness::Suite`]. The binaries in `tests/` run them
//! against Docker when built with `--features system-tests`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod suites;
