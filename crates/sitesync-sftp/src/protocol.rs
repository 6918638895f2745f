//! SFTP protocol constants and status mapping
//!
//! Status codes follow draft-ietf-secsh-filexfer (v3 codes plus the later
//! additions libssh2 reports). Session codes are libssh2's negative error
//! numbers. Both are translated into the shared error taxonomy here and
//! nowhere else.

use chrono::{DateTime, TimeZone, Utc};
use sitesync_core::{Error, FileEntry};

/// File type mask of the mode bits
pub const S_IFMT: u32 = 0o170000;
/// Directory type bits
pub const S_IFDIR: u32 = 0o040000;
/// Symbolic link type bits
pub const S_IFLNK: u32 = 0o120000;
/// Regular file type bits
pub const S_IFREG: u32 = 0o100000;

/// Largest permission value accepted by chmod (includes setuid/setgid/sticky)
pub const MAX_PERMISSION_BITS: u32 = 0o7777;

/// SFTP Status codes (RFC draft-ietf-secsh-filexfer)
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Success
    Ok = 0,
    /// End of file
    Eof = 1,
    /// No such file or directory
    NoSuchFile = 2,
    /// Permission denied
    PermissionDenied = 3,
    /// General failure
    Failure = 4,
    /// Bad message
    BadMessage = 5,
    /// No connection
    NoConnection = 6,
    /// Connection lost
    ConnectionLost = 7,
    /// Operation not supported
    OpUnsupported = 8,
    /// Invalid handle
    InvalidHandle = 9,
    /// No such path
    NoSuchPath = 10,
    /// File already exists
    FileAlreadyExists = 11,
    /// Write protected
    WriteProtect = 12,
    /// No media in drive
    NoMedia = 13,
    /// No space on filesystem
    NoSpaceOnFilesystem = 14,
    /// Quota exceeded
    QuotaExceeded = 15,
    /// Unknown principal
    UnknownPrincipal = 16,
    /// Lock conflict
    LockConflict = 17,
    /// Directory not empty
    DirNotEmpty = 18,
    /// Not a directory
    NotADirectory = 19,
    /// Invalid filename
    InvalidFilename = 20,
    /// Link loop
    LinkLoop = 21,
}

impl StatusCode {
    /// Decode a raw status number
    pub fn from_code(code: u32) -> Option<Self> {
        let status = match code {
            0 => StatusCode::Ok,
            1 => StatusCode::Eof,
            2 => StatusCode::NoSuchFile,
            3 => StatusCode::PermissionDenied,
            4 => StatusCode::Failure,
            5 => StatusCode::BadMessage,
            6 => StatusCode::NoConnection,
            7 => StatusCode::ConnectionLost,
            8 => StatusCode::OpUnsupported,
            9 => StatusCode::InvalidHandle,
            10 => StatusCode::NoSuchPath,
            11 => StatusCode::FileAlreadyExists,
            12 => StatusCode::WriteProtect,
            13 => StatusCode::NoMedia,
            14 => StatusCode::NoSpaceOnFilesystem,
            15 => StatusCode::QuotaExceeded,
            16 => StatusCode::UnknownPrincipal,
            17 => StatusCode::LockConflict,
            18 => StatusCode::DirNotEmpty,
            19 => StatusCode::NotADirectory,
            20 => StatusCode::InvalidFilename,
            21 => StatusCode::LinkLoop,
            _ => return None,
        };
        Some(status)
    }

    /// Translate into the error taxonomy
    pub fn into_error(self, context: &str) -> Error {
        match self {
            StatusCode::NoSuchFile | StatusCode::NoSuchPath | StatusCode::NotADirectory => {
                Error::NotFound(context.to_string())
            }
            StatusCode::PermissionDenied | StatusCode::WriteProtect => {
                Error::PermissionDenied(context.to_string())
            }
            StatusCode::FileAlreadyExists => Error::AlreadyExists(context.to_string()),
            StatusCode::NoConnection | StatusCode::ConnectionLost => {
                Error::HostUnreachable(context.to_string())
            }
            StatusCode::DirNotEmpty => {
                Error::InvalidInput(format!("{context}: directory not empty"))
            }
            StatusCode::InvalidFilename => Error::InvalidInput(context.to_string()),
            other => Error::Unknown(format!("{context} ({other:?})")),
        }
    }
}

/// libssh2 session-level error codes
pub mod session_code {
    pub const SOCKET_NONE: i32 = -1;
    pub const BANNER_RECV: i32 = -2;
    pub const BANNER_SEND: i32 = -3;
    pub const KEX_FAILURE: i32 = -5;
    pub const SOCKET_SEND: i32 = -7;
    pub const KEY_EXCHANGE_FAILURE: i32 = -8;
    pub const TIMEOUT: i32 = -9;
    pub const SOCKET_DISCONNECT: i32 = -13;
    pub const PROTO: i32 = -14;
    pub const PASSWORD_EXPIRED: i32 = -15;
    pub const FILE: i32 = -16;
    pub const METHOD_NONE: i32 = -17;
    pub const AUTHENTICATION_FAILED: i32 = -18;
    pub const PUBLICKEY_UNVERIFIED: i32 = -19;
    pub const CHANNEL_REQUEST_DENIED: i32 = -22;
    pub const CHANNEL_CLOSED: i32 = -26;
    pub const SOCKET_TIMEOUT: i32 = -30;
    pub const REQUEST_DENIED: i32 = -32;
    pub const PUBLICKEY_PROTOCOL: i32 = -36;
    pub const EAGAIN: i32 = -37;
    pub const SOCKET_RECV: i32 = -43;
    pub const BAD_SOCKET: i32 = -45;
    pub const KEYFILE_AUTH_FAILED: i32 = -48;
}

/// Translate a libssh2 session error code into the error taxonomy
pub fn session_error(code: i32, context: &str) -> Error {
    use session_code::*;

    match code {
        TIMEOUT | SOCKET_TIMEOUT | EAGAIN => Error::Timeout(context.to_string()),
        SOCKET_NONE | BANNER_RECV | BANNER_SEND | KEX_FAILURE | SOCKET_SEND
        | KEY_EXCHANGE_FAILURE | SOCKET_DISCONNECT | PROTO | CHANNEL_CLOSED | SOCKET_RECV
        | BAD_SOCKET => Error::HostUnreachable(context.to_string()),
        PASSWORD_EXPIRED | FILE | METHOD_NONE | AUTHENTICATION_FAILED | PUBLICKEY_UNVERIFIED
        | PUBLICKEY_PROTOCOL | KEYFILE_AUTH_FAILED => {
            Error::AuthenticationFailure(context.to_string())
        }
        CHANNEL_REQUEST_DENIED | REQUEST_DENIED => Error::PermissionDenied(context.to_string()),
        _ => Error::Unknown(format!("{context} (libssh2 code {code})")),
    }
}

/// Translate a raw SFTP status number into the error taxonomy
pub fn status_error(code: u32, context: &str) -> Error {
    match StatusCode::from_code(code) {
        Some(status) => status.into_error(context),
        None => Error::Unknown(format!("{context} (SFTP status {code})")),
    }
}

/// File attributes as carried by SFTP ATTRS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileAttrs {
    pub size: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub permissions: Option<u32>,
    pub atime: Option<u64>,
    pub mtime: Option<u64>,
}

impl FileAttrs {
    /// Attributes of a directory with the given permission bits
    pub fn directory(mode: u32) -> Self {
        Self {
            permissions: Some(S_IFDIR | (mode & MAX_PERMISSION_BITS)),
            ..Default::default()
        }
    }

    /// Attributes of a regular file of the given size
    pub fn file(size: u64, mode: u32) -> Self {
        Self {
            size: Some(size),
            permissions: Some(S_IFREG | (mode & MAX_PERMISSION_BITS)),
            ..Default::default()
        }
    }

    pub fn is_dir(&self) -> bool {
        self.permissions
            .map(|p| p & S_IFMT == S_IFDIR)
            .unwrap_or(false)
    }

    /// Render `ls -l` style permissions, e.g. `drwxr-xr-x`
    pub fn permissions_string(&self) -> String {
        let mode = self.permissions.unwrap_or(0);
        let mut out = String::with_capacity(10);

        out.push(match mode & S_IFMT {
            S_IFDIR => 'd',
            S_IFLNK => 'l',
            _ => '-',
        });

        let special = [(0o4000, 's', 'S'), (0o2000, 's', 'S'), (0o1000, 't', 'T')];
        for (i, shift) in [6u32, 3, 0].into_iter().enumerate() {
            let bits = (mode >> shift) & 0o7;
            out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
            out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
            let (flag, set_exec, set_noexec) = special[i];
            let exec = bits & 0o1 != 0;
            out.push(match (mode & flag != 0, exec) {
                (true, true) => set_exec,
                (true, false) => set_noexec,
                (false, true) => 'x',
                (false, false) => '-',
            });
        }

        out
    }

    /// Build the public entry for this attribute set
    pub fn to_entry(&self, name: &str, path: &str) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            path: path.to_string(),
            is_directory: self.is_dir(),
            size: self.size.unwrap_or(0),
            permissions: self.permissions_string(),
            modified: self.mtime.and_then(epoch_to_utc),
            accessed: self.atime.and_then(epoch_to_utc),
            uid: self.uid,
            gid: self.gid,
        }
    }
}

fn epoch_to_utc(secs: u64) -> Option<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
}

/// Parse a chmod permission string such as `755`, `0644` or `0o750`
pub fn parse_mode(mode: &str) -> sitesync_core::Result<u32> {
    let trimmed = mode.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);

    if digits.is_empty() || !digits.chars().all(|c| ('0'..='7').contains(&c)) {
        return Err(Error::invalid_input(format!(
            "Permission string must be octal: {mode:?}"
        )));
    }

    let value = u32::from_str_radix(digits, 8)
        .map_err(|e| Error::invalid_input(format!("Invalid permission string {mode:?}: {e}")))?;

    if value > MAX_PERMISSION_BITS {
        return Err(Error::invalid_input(format!(
            "Permission value out of range: {mode:?}"
        )));
    }

    Ok(value)
}
