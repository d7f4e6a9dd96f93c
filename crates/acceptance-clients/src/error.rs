// crates/acceptance-clients/src/error.rs
// ============================================================================
// Module: Client Errors
// Description: Failures raised by protocol client operations.
// Purpose: Keep setup failures apart from failures inside a scenario body.
// Dependencies: thiserror, acceptance-harness
// ============================================================================

//! Client errors and their mapping onto harness failure kinds.

use acceptance_harness::HarnessError;
use thiserror::Error;

/// Errors raised by SFTP and database operations after setup.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The lazily opened connection could not be established.
    #[error("connect to {target} failed: {message}")]
    Connect {
        /// Endpoint or database being reached.
        target: String,
        /// Driver message.
        message: String,
    },
    /// A remote operation failed on an established connection.
    #[error("{operation} {target} failed: {message}")]
    Operation {
        /// Operation name (`create`, `read`, `exec`, ...).
        operation: &'static str,
        /// Remote path or statement.
        target: String,
        /// Driver message.
        message: String,
    },
    /// The client was already closed.
    #[error("{0} is closed")]
    Closed(String),
}

impl ClientError {
    /// Builds an operation error.
    pub fn operation(operation: &'static str, target: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Operation {
            operation,
            target: target.into(),
            message: err.to_string(),
        }
    }

    /// Maps into a harness error for the scenario step `step`.
    ///
    /// Connection failures stay client setup failures; everything else is a
    /// violated expectation of the scenario body.
    #[must_use]
    pub fn in_step(self, step: &str) -> HarnessError {
        match self {
            Self::Connect {
                ..
            } => HarnessError::ClientSetup(format!("{step}: {self}")),
            Self::Operation {
                ..
            }
            | Self::Closed(_) => HarnessError::Assertion(format!("failed to {step}: {self}")),
        }
    }
}

impl From<ClientError> for HarnessError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Connect {
                ..
            } => Self::ClientSetup(err.to_string()),
            ClientError::Operation {
                ..
            }
            | ClientError::Closed(_) => Self::Assertion(err.to_string()),
        }
    }
}
