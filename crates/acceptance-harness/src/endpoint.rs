// crates/acceptance-harness/src/endpoint.rs
// ============================================================================
// Module: Ports and Endpoints
// Description: Container port declarations and mapped host endpoints.
// Purpose: Type the `22/tcp` style port syntax and the `(host, port)` binding.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`ContainerPort`] names a port inside the container. After readiness the
//! orchestrator binds it to a host-side [`Endpoint`]. Endpoints are never
//! cached across scenarios; each fresh container is queried again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::str::FromStr;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Container Ports
// ============================================================================

/// Transport protocol of an exposed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl Protocol {
    /// Returns the lowercase protocol suffix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// A port exposed inside the container, written `22/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerPort {
    /// Port number inside the container.
    pub number: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

impl ContainerPort {
    /// Declares a TCP port.
    #[must_use]
    pub const fn tcp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Tcp,
        }
    }

    /// Declares a UDP port.
    #[must_use]
    pub const fn udp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Udp,
        }
    }
}

impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol.as_str())
    }
}

impl FromStr for ContainerPort {
    type Err = HarnessError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || HarnessError::Config(format!("invalid container port '{raw}'"));
        let (number, protocol) = match raw.trim().split_once('/') {
            Some((number, "tcp")) => (number, Protocol::Tcp),
            Some((number, "udp")) => (number, Protocol::Udp),
            Some(_) => return Err(invalid()),
            None => (raw.trim(), Protocol::Tcp),
        };
        let number: u16 = number.parse().map_err(|_| invalid())?;
        if number == 0 {
            return Err(invalid());
        }
        Ok(Self {
            number,
            protocol,
        })
    }
}

// ============================================================================
// SECTION: Endpoints
// ============================================================================

/// Host-side address of a mapped container port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address, typically loopback.
    pub host: String,
    /// Host-side mapped port.
    pub port: u16,
}

impl Endpoint {
    /// Builds an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolves the endpoint into socket addresses.
    ///
    /// # Errors
    ///
    /// Returns an IO error when the host cannot be resolved.
    pub fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        Ok((host, self.port).to_socket_addrs()?.collect())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
