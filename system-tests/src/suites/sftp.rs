// system-tests/src/suites/sftp.rs
// ============================================================================
// Module: SFTP Server Suite
// Description: Upload-and-verify scenarios against the atmoz/sftp image.
// Purpose: Prove a file written over SFTP reads back byte for byte.
// Dependencies: acceptance-harness, acceptance-clients, tempfile
// ============================================================================

//! ## Overview
//! Setup starts `atmoz/sftp` with one password user owning `upload/`, waits
//! for port 22 to listen, and logs in over SSH. The scenario writes the
//! payload to a local scratch file, streams it to the server, and reads it
//! back. The remote file is left in place and goes away with the container.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io;
use std::io::Seek;
use std::io::Write;
use std::time::Duration;

use acceptance_clients::HostKeyPolicy;
use acceptance_clients::SftpFixture;
use acceptance_clients::SftpUser;
use acceptance_harness::ContainerFixture;
use acceptance_harness::ContainerPort;
use acceptance_harness::ContainerRequest;
use acceptance_harness::HarnessConfig;
use acceptance_harness::HarnessError;
use acceptance_harness::LifecycleState;
use acceptance_harness::Readiness;
use acceptance_harness::ScenarioEnv;
use acceptance_harness::Suite;
use acceptance_harness::TeardownLog;
use acceptance_harness::assert::ensure_bytes_eq;
use acceptance_harness::assert::ensure_ok;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Suite name.
pub const SUITE_NAME: &str = "SFTP Server";
/// Scenario name for the happy path.
pub const UPLOAD_SCENARIO: &str = "upload and verify a file";
/// Server image.
pub const IMAGE: &str = "atmoz/sftp";
/// SSH port inside the container.
pub const SSH_PORT: ContainerPort = ContainerPort::tcp(22);
/// Budget for the SSH port to start listening.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for TCP connect and each SSH call.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
/// Remote upload target.
pub const REMOTE_PATH: &str = "/upload/testfile.txt";
/// Uploaded bytes.
pub const PAYLOAD: &[u8] = b"Hello, SFTP!";

/// The single login the container is started with.
#[must_use]
pub fn server_user() -> SftpUser {
    SftpUser::new("foo", "pass").with_dir("upload")
}

/// Container request for the SFTP server.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when the image reference is invalid.
pub fn container_request() -> Result<ContainerRequest, HarnessError> {
    Ok(ContainerRequest::new(IMAGE, Readiness::listening_port(SSH_PORT))?
        .with_exposed_port(SSH_PORT)
        .with_env("SFTP_USERS", server_user().to_string())
        .with_startup_timeout(STARTUP_TIMEOUT))
}

// ============================================================================
// SECTION: Context And Hooks
// ============================================================================

/// Handles shared by setup, the scenario body, and teardown.
#[derive(Debug, Default)]
pub struct SftpContext {
    /// Running server.
    pub container: Option<ContainerFixture>,
    /// Logged-in SFTP session.
    pub client: Option<SftpFixture>,
    /// Lifecycle state the container ended in, set by teardown.
    pub terminated_as: Option<LifecycleState>,
}

impl SftpContext {
    /// Returns the session opened by setup.
    fn client(&self) -> Result<&SftpFixture, HarnessError> {
        self.client.as_ref().ok_or_else(|| HarnessError::ClientSetup("sftp session not opened".to_string()))
    }
}

/// Starts the server and logs in.
///
/// # Errors
///
/// Returns the first container start, endpoint, or client setup failure.
pub fn setup(ctx: &mut SftpContext, env: &ScenarioEnv) -> Result<(), HarnessError> {
    let container = ctx.container.insert(env.start_container(&container_request()?)?);
    let endpoint = container.endpoint(SSH_PORT)?;
    let client =
        SftpFixture::connect(&endpoint, &server_user().credentials(), &HostKeyPolicy::AcceptAny, CLIENT_TIMEOUT)?;
    ctx.client = Some(client);
    Ok(())
}

/// Closes the session, then terminates the server.
pub fn teardown(ctx: &mut SftpContext, log: &mut TeardownLog) {
    ctx.terminated_as = log.close_then_terminate(
        "close sftp session",
        ctx.client.take(),
        |mut client| client.close(),
        ctx.container.take(),
    );
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

/// Uploads the payload and reads it back from the same path.
///
/// # Errors
///
/// Returns [`HarnessError::Assertion`] when a step fails or the bytes differ.
pub fn upload_and_verify(ctx: &mut SftpContext) -> Result<(), HarnessError> {
    upload_payload(ctx.client()?, REMOTE_PATH)?;
    verify_contents(ctx.client()?, REMOTE_PATH)
}

/// Uploads the payload, plants different bytes at `decoy_path`, and verifies
/// the decoy. Always fails with an assertion.
///
/// # Errors
///
/// Returns [`HarnessError::Assertion`] naming the content mismatch.
pub fn upload_and_verify_decoy(ctx: &mut SftpContext, decoy_path: &str) -> Result<(), HarnessError> {
    let client = ctx.client()?;
    upload_payload(client, REMOTE_PATH)?;
    let mut decoy = ensure_ok("create decoy file", client.create(decoy_path))?;
    ensure_ok("write decoy file", decoy.write_bytes(b"not the payload"))?;
    ensure_ok("close decoy file", decoy.close())?;
    verify_contents(client, decoy_path)
}

/// Stages the payload in a local scratch file and streams it to `path`.
fn upload_payload(client: &SftpFixture, path: &str) -> Result<(), HarnessError> {
    let mut scratch = ensure_ok("create local scratch file", tempfile::NamedTempFile::new())?;
    ensure_ok("write local scratch file", scratch.write_all(PAYLOAD))?;
    ensure_ok("rewind local scratch file", scratch.rewind())?;

    let mut remote = ensure_ok("create remote file", client.create(path))?;
    let mut local: &File = scratch.as_file();
    let copied = ensure_ok("upload payload", io::copy(&mut local, &mut remote))?;
    ensure_ok("close remote file", remote.close())?;
    info!(path, bytes = copied, "payload uploaded");
    Ok(())
}

/// Reads `path` back and compares it to the payload.
fn verify_contents(client: &SftpFixture, path: &str) -> Result<(), HarnessError> {
    let contents = ensure_ok("read remote file", client.read_to_end(path))?;
    ensure_bytes_eq(path, PAYLOAD, &contents)
}

// ============================================================================
// SECTION: Suite
// ============================================================================

/// The SFTP suite with its happy-path scenario.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when the harness environment is invalid.
pub fn suite() -> Result<Suite<SftpContext>, HarnessError> {
    Ok(base_suite(SUITE_NAME, HarnessConfig::load()?).scenario(UPLOAD_SCENARIO, upload_and_verify))
}

/// Suite with the SFTP hooks and no scenarios.
#[must_use]
pub fn base_suite(name: &str, config: HarnessConfig) -> Suite<SftpContext> {
    Suite::new(name).with_config(config).before_each(setup).after_each(teardown)
}
