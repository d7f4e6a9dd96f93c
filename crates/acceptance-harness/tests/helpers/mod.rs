// crates/acceptance-harness/tests/helpers/mod.rs
// ============================================================================
// Module: Harness Test Helpers
// Description: Shared helpers for acceptance-harness integration tests.
// Purpose: Provide an in-process container runtime for lifecycle tests.
// Dependencies: acceptance-harness
// ============================================================================

//! Shared helpers for harness integration tests.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test binaries.")]

pub mod fake_runtime;
