// crates/acceptance-clients/src/lib.rs
// ============================================================================
// Module: Acceptance Clients Library
// Description: Protocol client fixtures bound to container endpoints.
// Purpose: Give scenarios an SFTP session and a lazily connecting database.
// Dependencies: ssh2, postgres, url, acceptance-harness
// ============================================================================

//! ## Overview
//! Clients are built only from endpoints of ready containers and are closed
//! by scenario teardown before the container is terminated.
//!
//! - [`sftp::SftpFixture`]: SSH password login plus SFTP subsystem.
//! - [`database::LazyDatabase`]: Postgres handle that connects on first use.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod database;
pub mod error;
pub mod sftp;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use database::LazyDatabase;
pub use database::PostgresDsn;
pub use database::PostgresOptions;
pub use error::ClientError;
pub use sftp::HostKeyPolicy;
pub use sftp::RemoteFile;
pub use sftp::SftpFixture;
pub use sftp::SftpUser;
pub use sftp::SshCredentials;
