// crates/acceptance-harness/src/readiness.rs
// ============================================================================
// Module: Readiness Predicates
// Description: Port-listening and log-match readiness for containers.
// Purpose: Ensure containers are usable before any client call is issued.
// Dependencies: thiserror, tracing
// ============================================================================

//! ## Overview
//! A container is ready once its [`Readiness`] predicate holds:
//! - [`Readiness::ListeningPort`]: the mapped port accepts a TCP connection
//!   that the peer keeps open. Port proxies accept and immediately close
//!   connections while the service is still down, so an instant EOF is not
//!   treated as listening.
//! - [`Readiness::LogMessage`]: a marker appeared at least `times` times in
//!   the merged stdout/stderr stream (see [`crate::logs::LogSink`]).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::ErrorKind;
use std::io::Read;
use std::net::TcpStream;
use std::thread::sleep;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::endpoint::ContainerPort;
use crate::endpoint::Endpoint;
use crate::timeouts::deadline_after;
use crate::timeouts::deadline_passed;
use crate::timeouts::next_wait;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Delay between port probes.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);
/// Connect timeout for a single probe.
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
/// How long a probe connection must stay open (or speak) to count.
const PROBE_HOLD_WINDOW: Duration = Duration::from_millis(250);

// ============================================================================
// SECTION: Predicates
// ============================================================================

/// Log marker and the number of times it must be observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMatch {
    /// Substring searched for in each log line.
    pub needle: String,
    /// Required number of matching lines.
    pub times: usize,
}

/// Condition a container must satisfy before it is considered ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The mapped host port for this container port accepts connections.
    ListeningPort(ContainerPort),
    /// A log marker was observed a number of times.
    LogMessage(LogMatch),
}

impl Readiness {
    /// Waits for `port` to be listening.
    #[must_use]
    pub const fn listening_port(port: ContainerPort) -> Self {
        Self::ListeningPort(port)
    }

    /// Waits for `needle` to appear `times` times in the container output.
    pub fn log_message(needle: impl Into<String>, times: usize) -> Self {
        Self::LogMessage(LogMatch {
            needle: needle.into(),
            times,
        })
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListeningPort(port) => write!(f, "port {port} listening"),
            Self::LogMessage(matcher) => {
                write!(f, "log '{}' observed {} time(s)", matcher.needle, matcher.times)
            }
        }
    }
}

// ============================================================================
// SECTION: Failures
// ============================================================================

/// Why a readiness wait did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessFailure {
    /// Fewer log occurrences than required before the timeout.
    #[error("observed {observed} of {required} occurrence(s) of '{needle}' within {timeout_ms} ms")]
    LogTimeout {
        /// Marker searched for.
        needle: String,
        /// Occurrences seen.
        observed: usize,
        /// Occurrences required.
        required: usize,
        /// Timeout that elapsed.
        timeout_ms: u128,
    },
    /// Every log stream closed before enough occurrences were seen.
    #[error("log streams closed after {observed} of {required} occurrence(s) of '{needle}'")]
    LogStreamsClosed {
        /// Marker searched for.
        needle: String,
        /// Occurrences seen.
        observed: usize,
        /// Occurrences required.
        required: usize,
    },
    /// The port never held a connection open before the timeout.
    #[error("{endpoint} not listening within {timeout_ms} ms: {last_error}")]
    PortTimeout {
        /// Endpoint probed.
        endpoint: String,
        /// Timeout that elapsed.
        timeout_ms: u128,
        /// Last probe error.
        last_error: String,
    },
    /// The wait was cancelled.
    #[error("readiness wait cancelled")]
    Cancelled,
}

// ============================================================================
// SECTION: Port Probing
// ============================================================================

/// Polls `endpoint` until it holds a connection open or `timeout` elapses.
///
/// # Errors
///
/// Returns [`ReadinessFailure::PortTimeout`] or [`ReadinessFailure::Cancelled`].
pub fn wait_for_listening(
    endpoint: &Endpoint,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<(), ReadinessFailure> {
    let deadline = deadline_after(timeout);
    let mut attempts = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(ReadinessFailure::Cancelled);
        }
        attempts = attempts.saturating_add(1);
        let last_error = match probe_once(endpoint) {
            Ok(()) => {
                debug!(%endpoint, attempts, "port listening");
                return Ok(());
            }
            Err(err) => err,
        };
        let now = Instant::now();
        if deadline_passed(deadline, now) {
            return Err(ReadinessFailure::PortTimeout {
                endpoint: endpoint.to_string(),
                timeout_ms: timeout.as_millis(),
                last_error: format!("{last_error} (after {attempts} attempts)"),
            });
        }
        sleep(next_wait(deadline, now, PROBE_INTERVAL));
    }
}

/// Connects once and checks the peer does not close the connection at once.
fn probe_once(endpoint: &Endpoint) -> Result<(), String> {
    let addrs = endpoint.socket_addrs().map_err(|err| format!("resolve failed: {err}"))?;
    let mut last_error = format!("{endpoint} resolved to no addresses");
    for addr in addrs {
        let stream = match TcpStream::connect_timeout(&addr, PROBE_CONNECT_TIMEOUT) {
            Ok(stream) => stream,
            Err(err) => {
                last_error = format!("connect {addr}: {err}");
                continue;
            }
        };
        stream
            .set_read_timeout(Some(PROBE_HOLD_WINDOW))
            .map_err(|err| format!("set read timeout: {err}"))?;
        let mut byte = [0u8; 1];
        match (&stream).read(&mut byte) {
            Ok(0) => last_error = format!("{addr} closed the connection"),
            Ok(_) => return Ok(()),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                return Ok(());
            }
            Err(err) => last_error = format!("read {addr}: {err}"),
        }
    }
    Err(last_error)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
