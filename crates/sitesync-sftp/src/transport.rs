//! Transport seam between the engine and an SSH implementation
//!
//! Everything here is blocking. The engine calls into these traits from
//! `spawn_blocking` workers, never from the async executor threads.

use sitesync_core::{Credential, Result, SiteDescriptor};
use std::sync::Arc;
use std::time::Duration;

use crate::protocol::FileAttrs;

/// One raw directory entry as returned by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub name: String,
    pub attrs: FileAttrs,
}

/// Opens transport connections to remote sites
pub trait Connector: Send + Sync {
    /// Open TCP with a bounded timeout and complete the SSH handshake
    fn handshake(&self, site: &SiteDescriptor, timeout: Duration)
    -> Result<Box<dyn PendingSession>>;
}

/// A handshaken, not yet authenticated connection
pub trait PendingSession: Send {
    /// Hex SHA-256 of the server host key, if the server presented one
    fn host_key_fingerprint(&self) -> Option<String>;

    /// Authenticate and hand back the live session
    fn authenticate(
        self: Box<Self>,
        username: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn RemoteSession>>;
}

/// An authenticated transport-level connection
pub trait RemoteSession: Send + Sync {
    /// False once the session was closed or hit a transport fault
    fn is_connected(&self) -> bool;

    /// Send a keepalive round trip; an error means the peer is gone
    fn probe(&self) -> Result<()>;

    /// Open a file-transfer channel for one operation
    fn open_channel(&self, timeout: Duration) -> Result<Box<dyn RemoteChannel>>;

    /// Disconnect; safe to call more than once
    fn disconnect(&self);
}

/// A file-transfer channel multiplexed over a session
pub trait RemoteChannel: Send {
    /// Entries of `path`; may include the `.` and `..` pseudo-entries
    fn read_dir(&self, path: &str) -> Result<Vec<RawEntry>>;

    /// Attributes of `path`, following symlinks
    fn stat(&self, path: &str) -> Result<FileAttrs>;

    /// Attributes of `path` itself, without following symlinks
    fn lstat(&self, path: &str) -> Result<FileAttrs>;

    fn mkdir(&self, path: &str, mode: u32) -> Result<()>;

    fn rmdir(&self, path: &str) -> Result<()>;

    fn unlink(&self, path: &str) -> Result<()>;

    fn rename(&self, old_path: &str, new_path: &str, overwrite: bool) -> Result<()>;

    fn set_permissions(&self, path: &str, mode: u32) -> Result<()>;

    /// Write `data` to `path`, truncating any existing file
    ///
    /// With `exclusive` the open fails if the file already exists.
    /// `on_progress` receives the cumulative byte count after each chunk.
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
        exclusive: bool,
        chunk_size: usize,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<()>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
}
