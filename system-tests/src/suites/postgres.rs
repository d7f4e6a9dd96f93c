// system-tests/src/suites/postgres.rs
// ============================================================================
// Module: Postgres Container Suite
// Description: Liveness and DDL/DML scenarios against postgres:16-alpine.
// Purpose: Prove the containerized server runs and round-trips a row.
// Dependencies: acceptance-harness, acceptance-clients
// ============================================================================

//! ## Overview
//! Setup starts `postgres:16-alpine` with a fixed database and superuser and
//! waits for the readiness marker to be logged twice: the image's init
//! server logs it once before restarting, so the first occurrence is not the
//! final server. Every scenario gets a fresh container. The database handle
//! connects on its first statement.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use acceptance_clients::LazyDatabase;
use acceptance_clients::PostgresOptions;
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
use acceptance_harness::assert::ensure;
use acceptance_harness::assert::ensure_eq;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Suite name.
pub const SUITE_NAME: &str = "PostgreSQL Container";
/// Scenario name for the liveness check.
pub const RUNNING_SCENARIO: &str = "container is running";
/// Scenario name for the table round trip.
pub const CREATE_QUERY_SCENARIO: &str = "create table, insert, and query a row";
/// Server image.
pub const IMAGE: &str = "docker.io/postgres:16-alpine";
/// Postgres port inside the container.
pub const PG_PORT: ContainerPort = ContainerPort::tcp(5432);
/// Log line marking the server ready.
pub const READY_MARKER: &str = "database system is ready to accept connections";
/// Occurrences of [`READY_MARKER`] the image emits on a fresh start.
pub const READY_OCCURRENCES: usize = 2;
/// Budget for the readiness marker.
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Database and superuser the container is initialized with.
#[must_use]
pub fn options() -> PostgresOptions {
    PostgresOptions::new("testdb", "testuser", "testpass")
}

/// Container request requiring `occurrences` readiness markers.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when the image reference is invalid.
pub fn container_request(occurrences: usize) -> Result<ContainerRequest, HarnessError> {
    let request = ContainerRequest::new(IMAGE, Readiness::log_message(READY_MARKER, occurrences))?
        .with_exposed_port(PG_PORT)
        .with_startup_timeout(STARTUP_TIMEOUT);
    Ok(options().container_env().into_iter().fold(request, |request, (name, value)| request.with_env(name, value)))
}

// ============================================================================
// SECTION: Context And Hooks
// ============================================================================

/// Handles shared by setup, the scenario body, and teardown.
#[derive(Debug, Default)]
pub struct PostgresContext {
    /// Running server.
    pub container: Option<ContainerFixture>,
    /// Lazily connecting database handle.
    pub db: Option<LazyDatabase>,
    /// Lifecycle state the container ended in, set by teardown.
    pub terminated_as: Option<LifecycleState>,
}

impl PostgresContext {
    /// Returns the running container.
    fn container(&self) -> Result<&ContainerFixture, HarnessError> {
        self.container.as_ref().ok_or_else(|| HarnessError::EndpointDiscovery("container not started".to_string()))
    }

    /// Returns the database handle.
    fn db(&mut self) -> Result<&mut LazyDatabase, HarnessError> {
        self.db.as_mut().ok_or_else(|| HarnessError::ClientSetup("database handle not opened".to_string()))
    }
}

/// Starts the server and prepares a database handle for it.
///
/// # Errors
///
/// Returns the first container start, endpoint, or DSN failure.
pub fn setup(ctx: &mut PostgresContext, env: &ScenarioEnv) -> Result<(), HarnessError> {
    let container = ctx.container.insert(env.start_container(&container_request(READY_OCCURRENCES)?)?);
    let host = container.host()?;
    let port = container.mapped_port(PG_PORT)?;
    ctx.db = Some(LazyDatabase::open(options().dsn(host, port))?);
    Ok(())
}

/// Closes the database handle, then terminates the server.
pub fn teardown(ctx: &mut PostgresContext, log: &mut TeardownLog) {
    ctx.terminated_as =
        log.close_then_terminate("close database", ctx.db.take(), |mut db| db.close(), ctx.container.take());
}

// ============================================================================
// SECTION: Scenarios
// ============================================================================

/// Asserts the container process is running.
///
/// # Errors
///
/// Returns [`HarnessError::Assertion`] when the container is not running.
pub fn container_is_running(ctx: &mut PostgresContext) -> Result<(), HarnessError> {
    let state = ctx.container()?.state()?;
    ensure(state.running, || format!("container {} is not running ({})", state.id, state.lifecycle))
}

/// Creates `users`, inserts Alice, and reads her back.
///
/// # Errors
///
/// Returns [`HarnessError::ClientSetup`] when the first connection fails and
/// [`HarnessError::Assertion`] when a statement fails or the row differs.
pub fn create_insert_query(ctx: &mut PostgresContext) -> Result<(), HarnessError> {
    let db = ctx.db()?;
    db.exec("CREATE TABLE users (id SERIAL PRIMARY KEY, name VARCHAR(50))")
        .map_err(|err| err.in_step("create table"))?;
    let inserted =
        db.exec("INSERT INTO users (name) VALUES ('Alice')").map_err(|err| err.in_step("insert row"))?;
    ensure_eq("rows inserted", &1, &inserted)?;
    let name: String = db
        .query_scalar("SELECT name FROM users WHERE name = 'Alice'")
        .map_err(|err| err.in_step("query row"))?;
    ensure_eq("name", "Alice", name.as_str())
}

// ============================================================================
// SECTION: Suite
// ============================================================================

/// The Postgres suite with both scenarios.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when the harness environment is invalid.
pub fn suite() -> Result<Suite<PostgresContext>, HarnessError> {
    Ok(base_suite(SUITE_NAME, HarnessConfig::load()?)
        .scenario(RUNNING_SCENARIO, container_is_running)
        .scenario(CREATE_QUERY_SCENARIO, create_insert_query))
}

/// Suite with the Postgres hooks and no scenarios.
#[must_use]
pub fn base_suite(name: &str, config: HarnessConfig) -> Suite<PostgresContext> {
    Suite::new(name).with_config(config).before_each(setup).after_each(teardown)
}
