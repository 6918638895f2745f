//! libssh2-backed transport
//!
//! `ssh2` is blocking; sessions and channels from this module are only
//! driven from `spawn_blocking` workers.

use sitesync_core::{Credential, Error, Result, SiteDescriptor};
use ssh2::{ErrorCode, FileStat, HashType, OpenFlags, OpenType, RenameFlags, Session, Sftp};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::protocol::{FileAttrs, session_error, status_error};
use crate::transport::{Connector, PendingSession, RawEntry, RemoteChannel, RemoteSession};

/// Mode used for files created by uploads
const DEFAULT_FILE_MODE: i32 = 0o644;

/// Connector over real TCP + libssh2
#[derive(Debug, Clone)]
pub struct Ssh2Connector {
    keepalive_interval_secs: u32,
    operation_timeout: Duration,
}

impl Ssh2Connector {
    pub fn new(keepalive_interval_secs: u32, operation_timeout: Duration) -> Self {
        Self {
            keepalive_interval_secs,
            operation_timeout,
        }
    }
}

impl Default for Ssh2Connector {
    fn default() -> Self {
        Self::new(60, Duration::from_secs(300))
    }
}

/// Map an ssh2 error, distinguishing SFTP status codes from session codes
fn map_ssh_error(err: &ssh2::Error, context: &str) -> Error {
    let context = format!("{context}: {}", err.message());
    match err.code() {
        ErrorCode::SFTP(code) => status_error(u32::try_from(code).unwrap_or(u32::MAX), &context),
        ErrorCode::Session(code) => session_error(code, &context),
    }
}

/// Map an I/O error from an `ssh2::File`, keeping the libssh2 code when present
fn map_io_error(err: std::io::Error, context: &str) -> Error {
    if let Some(inner) = err
        .get_ref()
        .and_then(|e| e.downcast_ref::<ssh2::Error>())
    {
        return map_ssh_error(inner, context);
    }

    match Error::from(err) {
        Error::Unknown(detail) => Error::Unknown(format!("{context}: {detail}")),
        other => other,
    }
}

fn connect_tcp(site: &SiteDescriptor, timeout: Duration) -> Result<TcpStream> {
    let address = site.address();
    let addrs = (site.host.as_str(), site.port)
        .to_socket_addrs()
        .map_err(|e| Error::HostUnreachable(format!("Cannot resolve {address}: {e}")))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "TCP connect attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(match last_error {
        Some(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            Error::Timeout(format!("Connecting to {address} timed out after {timeout:?}"))
        }
        Some(e) => Error::HostUnreachable(format!("TCP connection to {address} failed: {e}")),
        None => Error::HostUnreachable(format!("No addresses found for {address}")),
    })
}

impl Connector for Ssh2Connector {
    fn handshake(
        &self,
        site: &SiteDescriptor,
        timeout: Duration,
    ) -> Result<Box<dyn PendingSession>> {
        let tcp = connect_tcp(site, timeout)?;

        let mut session = Session::new()
            .map_err(|e| Error::unknown(format!("Failed to create SSH session: {e}")))?;
        session.set_timeout(duration_ms(timeout));
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| map_ssh_error(&e, &format!("SSH handshake with {}", site.address())))?;

        info!(site_id = %site.id, address = %site.address(), "SSH handshake complete");

        Ok(Box::new(Ssh2PendingSession {
            session,
            label: site.address(),
            keepalive_interval_secs: self.keepalive_interval_secs,
            operation_timeout: self.operation_timeout,
        }))
    }
}

struct Ssh2PendingSession {
    session: Session,
    label: String,
    keepalive_interval_secs: u32,
    operation_timeout: Duration,
}

impl PendingSession for Ssh2PendingSession {
    fn host_key_fingerprint(&self) -> Option<String> {
        self.session.host_key_hash(HashType::Sha256).map(hex::encode)
    }

    fn authenticate(
        self: Box<Self>,
        username: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn RemoteSession>> {
        let context = format!(
            "{} authentication for {username}@{}",
            credential.method(),
            self.label
        );

        let outcome = match credential {
            Credential::Password(password) => {
                self.session.userauth_password(username, password.expose())
            }
            Credential::PrivateKey {
                key_pem,
                passphrase,
            } => self.session.userauth_pubkey_memory(
                username,
                None,
                key_pem,
                passphrase.as_ref().map(|p| p.expose()),
            ),
        };

        if let Err(e) = outcome {
            let err = map_ssh_error(&e, &context);
            // Anything that is not a transport fault is a rejected credential
            return Err(if err.is_transport_fault() {
                err
            } else {
                Error::AuthenticationFailure(err.to_string())
            });
        }

        if !self.session.authenticated() {
            return Err(Error::AuthenticationFailure(format!(
                "{context}: server did not accept the credential"
            )));
        }

        self.session.set_keepalive(true, self.keepalive_interval_secs);
        // A half-open connection must not block a worker forever
        let operation_timeout = duration_ms(self.operation_timeout);
        self.session.set_timeout(operation_timeout);

        Ok(Arc::new(Ssh2Session {
            session: self.session,
            label: self.label,
            connected: Arc::new(AtomicBool::new(true)),
            operation_timeout,
            timeout_lock: Mutex::new(()),
        }))
    }
}

struct Ssh2Session {
    session: Session,
    label: String,
    connected: Arc<AtomicBool>,
    /// Session-wide libssh2 timeout in milliseconds
    operation_timeout: u32,
    /// Held while the session timeout is narrowed for a channel open
    timeout_lock: Mutex<()>,
}

impl RemoteSession for Ssh2Session {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn probe(&self) -> Result<()> {
        match self.session.keepalive_send() {
            Ok(next_in) => {
                debug!(address = %self.label, next_in, "Keepalive sent");
                Ok(())
            }
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                Err(map_ssh_error(&e, &format!("Keepalive to {}", self.label)))
            }
        }
    }

    fn open_channel(&self, timeout: Duration) -> Result<Box<dyn RemoteChannel>> {
        let sftp = {
            let _guard = self
                .timeout_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            self.session.set_timeout(duration_ms(timeout));
            let sftp = self.session.sftp();
            self.session.set_timeout(self.operation_timeout);
            sftp
        };

        match sftp {
            Ok(sftp) => Ok(Box::new(Ssh2Channel {
                sftp,
                connected: Arc::clone(&self.connected),
            })),
            Err(e) => {
                let err = map_ssh_error(&e, &format!("Opening SFTP channel to {}", self.label));
                if err.is_transport_fault() {
                    self.connected.store(false, Ordering::Release);
                }
                Err(err)
            }
        }
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel)
            && let Err(e) = self
                .session
                .disconnect(None, "Client closing session", None)
        {
            warn!(address = %self.label, error = %e, "SSH disconnect reported an error");
        }
    }
}

struct Ssh2Channel {
    sftp: Sftp,
    connected: Arc<AtomicBool>,
}

impl Ssh2Channel {
    /// Map an error and drop the session's connected flag on transport faults
    fn fail(&self, err: &ssh2::Error, context: String) -> Error {
        self.note(map_ssh_error(err, &context))
    }

    fn fail_io(&self, err: std::io::Error, context: &str) -> Error {
        self.note(map_io_error(err, context))
    }

    fn note(&self, err: Error) -> Error {
        if err.is_transport_fault() {
            self.connected.store(false, Ordering::Release);
        }
        err
    }
}

fn to_attrs(stat: &FileStat) -> FileAttrs {
    FileAttrs {
        size: stat.size,
        uid: stat.uid,
        gid: stat.gid,
        permissions: stat.perm,
        atime: stat.atime,
        mtime: stat.mtime,
    }
}

fn duration_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}

impl RemoteChannel for Ssh2Channel {
    fn read_dir(&self, path: &str) -> Result<Vec<RawEntry>> {
        let entries = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|e| self.fail(&e, format!("Listing {path}")))?;

        Ok(entries
            .into_iter()
            .filter_map(|(entry_path, stat)| {
                let name = entry_path.file_name()?.to_string_lossy().into_owned();
                Some(RawEntry {
                    name,
                    attrs: to_attrs(&stat),
                })
            })
            .collect())
    }

    fn stat(&self, path: &str) -> Result<FileAttrs> {
        self.sftp
            .stat(Path::new(path))
            .map(|stat| to_attrs(&stat))
            .map_err(|e| self.fail(&e, format!("Stat {path}")))
    }

    fn lstat(&self, path: &str) -> Result<FileAttrs> {
        self.sftp
            .lstat(Path::new(path))
            .map(|stat| to_attrs(&stat))
            .map_err(|e| self.fail(&e, format!("Lstat {path}")))
    }

    fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        let mode = i32::try_from(mode).unwrap_or(0o755);
        self.sftp
            .mkdir(Path::new(path), mode)
            .map_err(|e| self.fail(&e, format!("Creating directory {path}")))
    }

    fn rmdir(&self, path: &str) -> Result<()> {
        self.sftp
            .rmdir(Path::new(path))
            .map_err(|e| self.fail(&e, format!("Removing directory {path}")))
    }

    fn unlink(&self, path: &str) -> Result<()> {
        self.sftp
            .unlink(Path::new(path))
            .map_err(|e| self.fail(&e, format!("Removing file {path}")))
    }

    fn rename(&self, old_path: &str, new_path: &str, overwrite: bool) -> Result<()> {
        let mut flags = RenameFlags::ATOMIC | RenameFlags::NATIVE;
        if overwrite {
            flags |= RenameFlags::OVERWRITE;
        }
        self.sftp
            .rename(Path::new(old_path), Path::new(new_path), Some(flags))
            .map_err(|e| self.fail(&e, format!("Renaming {old_path} to {new_path}")))
    }

    fn set_permissions(&self, path: &str, mode: u32) -> Result<()> {
        let stat = FileStat {
            size: None,
            uid: None,
            gid: None,
            perm: Some(mode),
            atime: None,
            mtime: None,
        };
        self.sftp
            .setstat(Path::new(path), stat)
            .map_err(|e| self.fail(&e, format!("Changing permissions of {path}")))
    }

    fn write_file(
        &self,
        path: &str,
        data: &[u8],
        exclusive: bool,
        chunk_size: usize,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<()> {
        let mut flags = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE;
        if exclusive {
            flags |= OpenFlags::EXCLUSIVE;
        }

        let mut file = self
            .sftp
            .open_mode(Path::new(path), flags, DEFAULT_FILE_MODE, OpenType::File)
            .map_err(|e| self.fail(&e, format!("Opening {path} for writing")))?;

        let mut written = 0u64;
        for chunk in data.chunks(chunk_size.max(1)) {
            file.write_all(chunk)
                .map_err(|e| self.fail_io(e, &format!("Writing {path}")))?;
            written += chunk.len() as u64;
            on_progress(written);
        }
        if data.is_empty() {
            on_progress(0);
        }

        file.flush()
            .map_err(|e| self.fail_io(e, &format!("Flushing {path}")))?;
        file.close()
            .map_err(|e| self.fail(&e, format!("Closing {path}")))
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let mut file = self
            .sftp
            .open(Path::new(path))
            .map_err(|e| self.fail(&e, format!("Opening {path} for reading")))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| self.fail_io(e, &format!("Reading {path}")))?;
        Ok(data)
    }
}
