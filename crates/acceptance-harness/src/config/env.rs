// crates/acceptance-harness/src/config/env.rs
// ============================================================================
// Module: Harness Environment
// Description: Environment-backed configuration for the acceptance harness.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 and empty values fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Largest accepted `ACCEPTANCE_TIMEOUT_SEC`, one day.
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Environment keys for harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Optional report root override.
    RunRoot,
    /// Optional startup timeout floor in seconds (1 to [`MAX_TIMEOUT_SECS`]).
    TimeoutSeconds,
    /// Allow reusing a non-empty run root (`true`/`false` or `1`/`0`).
    AllowOverwrite,
}

impl HarnessEnv {
    /// Every key, in declaration order.
    pub const ALL: [Self; 3] = [Self::RunRoot, Self::TimeoutSeconds, Self::AllowOverwrite];

    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunRoot => "ACCEPTANCE_RUN_ROOT",
            Self::TimeoutSeconds => "ACCEPTANCE_TIMEOUT_SEC",
            Self::AllowOverwrite => "ACCEPTANCE_ALLOW_OVERWRITE",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed harness configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HarnessConfig {
    /// Optional report root override.
    pub run_root: Option<PathBuf>,
    /// Optional floor applied to container startup timeouts.
    pub timeout_floor: Option<Duration>,
    /// Allow reusing a non-empty run root.
    pub allow_overwrite: bool,
}

impl HarnessConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] when a value is not valid UTF-8, is
    /// empty, or fails validation (for example, a zero timeout).
    pub fn load() -> Result<Self, HarnessError> {
        let run_root = read_env_nonempty(HarnessEnv::RunRoot.as_str())?.map(PathBuf::from);
        let timeout_floor = read_env_nonempty(HarnessEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_timeout_seconds(HarnessEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?;
        let allow_overwrite = parse_bool_env(
            HarnessEnv::AllowOverwrite.as_str(),
            read_env_nonempty(HarnessEnv::AllowOverwrite.as_str())?,
        )?;
        Ok(Self {
            run_root,
            timeout_floor,
            allow_overwrite,
        })
    }

    /// Returns a copy that writes reports under `root`.
    #[must_use]
    pub fn with_run_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.run_root = Some(root.into());
        self
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when the variable contains invalid UTF-8.
fn read_env_strict(name: &str) -> Result<Option<String>, HarnessError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string()
            .map(Some)
            .map_err(|_| HarnessError::Config(format!("{name} must be valid UTF-8")))
    })
}

/// Reads an environment variable and rejects empty values.
fn read_env_nonempty(name: &str) -> Result<Option<String>, HarnessError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => {
            Err(HarnessError::Config(format!("{name} must not be empty")))
        }
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive timeout value in seconds, bounded by [`MAX_TIMEOUT_SECS`].
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, HarnessError> {
    let invalid =
        || HarnessError::Config(format!("{name} must be a positive integer number of seconds"));
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    let secs: u64 = trimmed.parse().map_err(|_| invalid())?;
    if secs == 0 {
        return Err(HarnessError::Config(format!("{name} must be greater than zero")));
    }
    if secs > MAX_TIMEOUT_SECS {
        return Err(HarnessError::Config(format!(
            "{name} must be at most {MAX_TIMEOUT_SECS} seconds"
        )));
    }
    Ok(Duration::from_secs(secs))
}

/// Parses a boolean literal; an unset variable means `false`.
fn parse_bool_env(name: &str, raw: Option<String>) -> Result<bool, HarnessError> {
    let Some(value) = raw else {
        return Ok(false);
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(false);
    }
    Err(HarnessError::Config(format!("{name} must be 1, 0, true, or false")))
}
