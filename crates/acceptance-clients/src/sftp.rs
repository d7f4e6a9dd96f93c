// crates/acceptance-clients/src/sftp.rs
// ============================================================================
// Module: SFTP Client Fixture
// Description: SSH session plus SFTP channel bound to a container endpoint.
// Purpose: Upload and read back files on an SFTP server under test.
// Dependencies: ssh2, hex, tracing
// ============================================================================

//! ## Overview
//! [`SftpFixture::connect`] opens a TCP connection, performs the SSH
//! handshake, checks the host key against a [`HostKeyPolicy`], authenticates
//! with a password, and opens the SFTP subsystem. Any failure there is a
//! client setup failure. File operations afterwards return [`ClientError`].
//!
//! [`HostKeyPolicy::AcceptAny`] skips host key verification. It exists for
//! throwaway test containers whose host keys are generated at start and must
//! not be used against real servers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use acceptance_harness::Endpoint;
use acceptance_harness::HarnessError;
use ssh2::HashType;
use ssh2::Session;
use ssh2::Sftp;
use tracing::info;
use tracing::warn;

use crate::error::ClientError;

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Password credentials for an SSH login.
#[derive(Clone, PartialEq, Eq)]
pub struct SshCredentials {
    /// Login name.
    pub user: String,
    /// Password.
    pub password: String,
}

impl SshCredentials {
    /// Builds password credentials.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCredentials").field("user", &self.user).field("password", &"<redacted>").finish()
    }
}

/// How the server's host key is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any host key. Test containers only.
    AcceptAny,
    /// Require the SHA-256 digest of the host key to match.
    Sha256(Vec<u8>),
}

/// Checks `observed` (the SHA-256 host key digest) against `policy`.
///
/// Returns the hex fingerprint on success.
///
/// # Errors
///
/// Returns [`HarnessError::ClientSetup`] when the digest is missing or pinned
/// to a different value.
pub fn verify_host_key(policy: &HostKeyPolicy, observed: Option<&[u8]>) -> Result<String, HarnessError> {
    let fingerprint = observed.map(hex::encode);
    match policy {
        HostKeyPolicy::AcceptAny => Ok(fingerprint.unwrap_or_else(|| "unavailable".to_string())),
        HostKeyPolicy::Sha256(expected) => match observed {
            Some(digest) if digest == expected.as_slice() => Ok(fingerprint.unwrap_or_default()),
            Some(_) => Err(HarnessError::ClientSetup(format!(
                "host key mismatch: expected sha256:{}, got sha256:{}",
                hex::encode(expected),
                fingerprint.unwrap_or_default()
            ))),
            None => Err(HarnessError::ClientSetup("server host key digest unavailable".to_string())),
        },
    }
}

// ============================================================================
// SECTION: Server Users
// ============================================================================

/// One user entry for the `SFTP_USERS` variable of `atmoz/sftp`.
///
/// Renders as `name:password:uid:gid:dir1,dir2`; unset ids stay empty.
#[derive(Clone, PartialEq, Eq)]
pub struct SftpUser {
    /// Login name.
    pub name: String,
    /// Password.
    pub password: String,
    /// Optional numeric user id.
    pub uid: Option<u32>,
    /// Optional numeric group id.
    pub gid: Option<u32>,
    /// Directories created under the user's home.
    pub dirs: Vec<String>,
}

impl SftpUser {
    /// Builds a user without fixed ids or directories.
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            password: password.into(),
            uid: None,
            gid: None,
            dirs: Vec::new(),
        }
    }

    /// Adds a directory created under the user's home.
    #[must_use]
    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dirs.push(dir.into());
        self
    }

    /// Credentials for logging in as this user.
    #[must_use]
    pub fn credentials(&self) -> SshCredentials {
        SshCredentials::new(&self.name, &self.password)
    }
}

impl fmt::Debug for SftpUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpUser")
            .field("name", &self.name)
            .field("uid", &self.uid)
            .field("gid", &self.gid)
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SftpUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = |value: Option<u32>| value.map(|v| v.to_string()).unwrap_or_default();
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.name,
            self.password,
            id(self.uid),
            id(self.gid),
            self.dirs.join(",")
        )
    }
}

impl FromStr for SftpUser {
    type Err = HarnessError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || HarnessError::Config(format!("invalid sftp user spec '{raw}'"));
        let fields: Vec<&str> = raw.split(':').collect();
        if fields.len() < 2 || fields.len() > 5 || fields[0].is_empty() {
            return Err(invalid());
        }
        let id = |index: usize| -> Result<Option<u32>, HarnessError> {
            match fields.get(index).copied().unwrap_or_default() {
                "" => Ok(None),
                value => value.parse().map(Some).map_err(|_| invalid()),
            }
        };
        let dirs = fields
            .get(4)
            .map(|dirs| dirs.split(',').filter(|dir| !dir.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(Self {
            name: fields[0].to_string(),
            password: fields[1].to_string(),
            uid: id(2)?,
            gid: id(3)?,
            dirs,
        })
    }
}

// ============================================================================
// SECTION: Fixture
// ============================================================================

/// Authenticated SSH session with an open SFTP channel.
pub struct SftpFixture {
    /// Endpoint the session is bound to.
    endpoint: Endpoint,
    /// SSH session.
    session: Session,
    /// SFTP channel; `None` once closed.
    sftp: Option<Sftp>,
    /// Hex SHA-256 fingerprint of the server host key.
    host_key_fingerprint: String,
}

impl fmt::Debug for SftpFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpFixture")
            .field("endpoint", &self.endpoint)
            .field("open", &self.sftp.is_some())
            .field("host_key_fingerprint", &self.host_key_fingerprint)
            .finish_non_exhaustive()
    }
}

impl SftpFixture {
    /// Connects, authenticates, and opens the SFTP subsystem.
    ///
    /// `timeout` bounds the TCP connect and every blocking session call.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ClientSetup`] naming the step that failed.
    pub fn connect(
        endpoint: &Endpoint,
        credentials: &SshCredentials,
        host_key: &HostKeyPolicy,
        timeout: Duration,
    ) -> Result<Self, HarnessError> {
        let setup = |step: &str, err: &dyn fmt::Display| {
            HarnessError::ClientSetup(format!("{step} {endpoint}: {err}"))
        };
        let tcp = connect_tcp(endpoint, timeout).map_err(|err| setup("tcp connect", &err))?;
        let mut session = Session::new().map_err(|err| setup("ssh session init", &err))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
        session.handshake().map_err(|err| setup("ssh handshake", &err))?;

        let host_key_fingerprint = verify_host_key(host_key, session.host_key_hash(HashType::Sha256))?;
        if *host_key == HostKeyPolicy::AcceptAny {
            warn!(%endpoint, fingerprint = %host_key_fingerprint, "host key accepted without verification");
        } else {
            info!(%endpoint, fingerprint = %host_key_fingerprint, "host key verified");
        }

        session
            .userauth_password(&credentials.user, &credentials.password)
            .map_err(|err| setup(&format!("password auth as '{}' at", credentials.user), &err))?;
        if !session.authenticated() {
            return Err(setup("ssh auth", &format!("'{}' was not authenticated", credentials.user)));
        }
        let sftp = session.sftp().map_err(|err| setup("sftp subsystem", &err))?;
        info!(%endpoint, user = %credentials.user, "sftp session open");
        Ok(Self {
            endpoint: endpoint.clone(),
            session,
            sftp: Some(sftp),
            host_key_fingerprint,
        })
    }

    /// Endpoint the session is bound to.
    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Hex SHA-256 fingerprint of the server host key.
    #[must_use]
    pub fn host_key_fingerprint(&self) -> &str {
        &self.host_key_fingerprint
    }

    /// Returns the open channel.
    fn channel(&self) -> Result<&Sftp, ClientError> {
        self.sftp.as_ref().ok_or_else(|| ClientError::Closed(format!("sftp session to {}", self.endpoint)))
    }

    /// Creates (or truncates) `path` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Operation`] when the server refuses.
    pub fn create(&self, path: &str) -> Result<RemoteFile, ClientError> {
        let file = self.channel()?.create(Path::new(path)).map_err(|err| ClientError::operation("create", path, err))?;
        Ok(RemoteFile {
            path: path.to_string(),
            file,
        })
    }

    /// Opens `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Operation`] when the server refuses.
    pub fn open(&self, path: &str) -> Result<RemoteFile, ClientError> {
        let file = self.channel()?.open(Path::new(path)).map_err(|err| ClientError::operation("open", path, err))?;
        Ok(RemoteFile {
            path: path.to_string(),
            file,
        })
    }

    /// Reads the whole of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Operation`] when opening or reading fails.
    pub fn read_to_end(&self, path: &str) -> Result<Vec<u8>, ClientError> {
        let mut file = self.open(path)?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(|err| ClientError::operation("read", path, err))?;
        file.close()?;
        Ok(contents)
    }

    /// Closes the SFTP channel and disconnects the SSH session. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Teardown`] when the disconnect fails.
    pub fn close(&mut self) -> Result<(), HarnessError> {
        let Some(sftp) = self.sftp.take() else {
            return Ok(());
        };
        drop(sftp);
        self.session
            .disconnect(None, "scenario finished", None)
            .map_err(|err| HarnessError::Teardown(format!("ssh disconnect from {}: {err}", self.endpoint)))?;
        info!(endpoint = %self.endpoint, "sftp session closed");
        Ok(())
    }
}

/// Connects to the first reachable address of `endpoint`.
fn connect_tcp(endpoint: &Endpoint, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "endpoint resolved to no addresses");
    for addr in endpoint.socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = err,
        }
    }
    Err(last_error)
}

// ============================================================================
// SECTION: Remote Files
// ============================================================================

/// A file open on the SFTP server.
pub struct RemoteFile {
    /// Remote path, for error messages.
    path: String,
    /// SFTP file handle.
    file: ssh2::File,
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile").field("path", &self.path).finish_non_exhaustive()
    }
}

impl RemoteFile {
    /// Remote path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Writes all of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Operation`] when the write fails.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ClientError> {
        self.file.write_all(bytes).map_err(|err| ClientError::operation("write", &self.path, err))
    }

    /// Flushes and closes the handle.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Operation`] when the server reports a close failure.
    pub fn close(mut self) -> Result<(), ClientError> {
        self.file.flush().map_err(|err| ClientError::operation("flush", &self.path, err))?;
        self.file.close().map_err(|err| ClientError::operation("close", &self.path, err))
    }
}

impl Read for RemoteFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for RemoteFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions favor expect and inspect Debug output."
    )]

    use acceptance_harness::FailureKind;

    use super::HostKeyPolicy;
    use super::SftpUser;
    use super::verify_host_key;

    #[test]
    fn user_spec_renders_empty_ids() {
        let user = SftpUser::new("foo", "pass").with_dir("upload");
        assert_eq!(user.to_string(), "foo:pass:::upload");
        assert_eq!("foo:pass:::upload".parse::<SftpUser>().expect("parse"), user);

        let user: SftpUser = "bar:secret:1001:100:in,out".parse().expect("parse");
        assert_eq!(user.uid, Some(1001));
        assert_eq!(user.dirs, vec!["in".to_string(), "out".to_string()]);
        assert!("foo".parse::<SftpUser>().is_err());
        assert!("foo:pass:abc".parse::<SftpUser>().is_err());
    }

    #[test]
    fn user_debug_hides_password() {
        let rendered = format!("{:?}", SftpUser::new("foo", "hunter2").credentials());
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn pinned_host_key_must_match() {
        let digest = [7u8; 32];
        let fingerprint =
            verify_host_key(&HostKeyPolicy::Sha256(digest.to_vec()), Some(digest.as_slice())).expect("match");
        assert_eq!(fingerprint, "07".repeat(32));

        let err = verify_host_key(&HostKeyPolicy::Sha256(vec![1u8; 32]), Some(digest.as_slice())).expect_err("mismatch");
        assert_eq!(err.kind(), FailureKind::ClientSetup);
        assert!(verify_host_key(&HostKeyPolicy::Sha256(digest.to_vec()), None).is_err());
        assert!(verify_host_key(&HostKeyPolicy::AcceptAny, None).is_ok());
    }
}
