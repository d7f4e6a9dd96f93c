// crates/acceptance-harness/src/config/mod.rs
// ============================================================================
// Module: Harness Configuration
// Description: Environment overrides for report location and startup budgets.
// Purpose: Let CI stretch container startup and redirect reports without
//          touching suite code.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`HarnessConfig::load`] reads three optional variables, named by
//! [`HarnessEnv`]:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `ACCEPTANCE_RUN_ROOT` | Directory that receives per-scenario reports. |
//! | `ACCEPTANCE_TIMEOUT_SEC` | Floor for every startup timeout, 1 to [`MAX_TIMEOUT_SECS`]. |
//! | `ACCEPTANCE_ALLOW_OVERWRITE` | Reuse a run root that already holds reports. |
//!
//! The timeout floor is applied by [`crate::ScenarioEnv::start_container`]
//! and only lengthens a request's own budget, so a slow CI host can wait
//! longer for `postgres:16-alpine` while a developer run keeps the declared
//! five seconds. A malformed value is a [`crate::FailureKind::Config`]
//! error from `load`, raised before any container is launched.

mod env;


pub use env::HarnessConfig;
pub use env::HarnessEnv;
pub use env::MAX_TIMEOUT_SECS;
