// crates/acceptance-harness/src/docker.rs
// ============================================================================
// Module: Docker Runtime
// Description: testcontainers-backed implementation of the runtime seam.
// Purpose: Launch, inspect, follow, and remove real containers.
// Dependencies: testcontainers
// ============================================================================

//! ## Overview
//! [`DockerRuntime`] maps a [`ContainerRequest`] onto a testcontainers
//! `GenericImage` and starts it with the blocking runner. testcontainers' own
//! wait conditions are not used; readiness is evaluated by the harness so it
//! can count log occurrences strictly and honor cancellation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::process::Command;
use std::sync::OnceLock;

use testcontainers::Container;
use testcontainers::GenericImage;
use testcontainers::ImageExt;
use testcontainers::core::IntoContainerPort;
use testcontainers::runners::SyncRunner;
use tracing::debug;

use crate::container::ContainerRequest;
use crate::container::ContainerRuntime;
use crate::container::LaunchedContainer;
use crate::container::RuntimeError;
use crate::endpoint::ContainerPort;
use crate::endpoint::Protocol;
use crate::logs::LogSource;
use crate::logs::LogStream;

// ============================================================================
// SECTION: Runtime
// ============================================================================

/// Container runtime backed by the local Docker daemon.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerRuntime;

impl ContainerRuntime for DockerRuntime {
    fn ensure_available(&self) -> Result<(), RuntimeError> {
        static PROBE: OnceLock<Result<(), String>> = OnceLock::new();
        PROBE.get_or_init(probe_docker).clone().map_err(RuntimeError::new)
    }

    fn launch(&self, request: &ContainerRequest) -> Result<Box<dyn LaunchedContainer>, RuntimeError> {
        let mut image = GenericImage::new(request.image.name.clone(), request.image.tag.clone());
        for port in &request.exposed_ports {
            image = image.with_exposed_port(to_testcontainers_port(*port));
        }
        let mut container_request: testcontainers::ContainerRequest<GenericImage> = image.into();
        for (name, value) in &request.env {
            container_request = container_request.with_env_var(name, value);
        }
        debug!(image = %request.image, "starting container");
        let container = container_request
            .start()
            .map_err(|err| RuntimeError::new(format!("failed to start {}: {err}", request.image)))?;
        Ok(Box::new(DockerContainer {
            container,
        }))
    }
}

/// A container started through testcontainers.
struct DockerContainer {
    /// Blocking testcontainers handle; removing it removes the container.
    container: Container<GenericImage>,
}

impl LaunchedContainer for DockerContainer {
    fn id(&self) -> String {
        self.container.id().to_string()
    }

    fn host(&self) -> Result<String, RuntimeError> {
        self.container
            .get_host()
            .map(|host| host.to_string())
            .map_err(|err| RuntimeError::new(err.to_string()))
    }

    fn mapped_port(&self, port: ContainerPort) -> Result<u16, RuntimeError> {
        self.container
            .get_host_port_ipv4(to_testcontainers_port(port))
            .map_err(|err| RuntimeError::new(err.to_string()))
    }

    fn is_running(&self) -> Result<bool, RuntimeError> {
        self.container.is_running().map_err(|err| RuntimeError::new(err.to_string()))
    }

    fn log_streams(&self) -> Vec<(LogSource, LogStream)> {
        vec![
            (LogSource::Stdout, self.container.stdout(true)),
            (LogSource::Stderr, self.container.stderr(true)),
        ]
    }

    fn remove(self: Box<Self>) -> Result<(), RuntimeError> {
        self.container.rm().map_err(|err| RuntimeError::new(err.to_string()))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Converts a harness port into the testcontainers representation.
fn to_testcontainers_port(port: ContainerPort) -> testcontainers::core::ContainerPort {
    match port.protocol {
        Protocol::Tcp => port.number.tcp(),
        Protocol::Udp => port.number.udp(),
    }
}

/// Asks the docker CLI whether the daemon answers.
fn probe_docker() -> Result<(), String> {
    let output = Command::new("docker")
        .args(["version", "--format", "{{.Server.Version}}"])
        .output()
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => {
                "docker CLI not found in PATH; install Docker to run container suites".to_string()
            }
            _ => format!("failed to run docker CLI: {err}"),
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("docker daemon unavailable: {}", stderr.trim()));
    }
    debug!(version = %String::from_utf8_lossy(&output.stdout).trim(), "docker daemon reachable");
    Ok(())
}
