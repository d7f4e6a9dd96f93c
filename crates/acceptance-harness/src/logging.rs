// crates/acceptance-harness/src/logging.rs
// ============================================================================
// Module: Logging
// Description: tracing subscriber setup for test binaries.
// Purpose: Give every suite the same structured log output.
// Dependencies: tracing-subscriber
// ============================================================================

//! Tracing subscriber setup for test binaries.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

/// Installs a fmt subscriber honoring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}
