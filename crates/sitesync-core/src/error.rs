//! Error taxonomy shared by every remote file operation
//!
//! Each variant carries a human-readable detail string. Callers that need to
//! branch on the failure use [`Error::kind`] instead of matching on messages.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for Sitesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sitesync error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Credentials were rejected, could not be decrypted, or the host key
    /// could not be verified
    #[error("Authentication failed: {0}")]
    AuthenticationFailure(String),

    /// The remote host could not be reached or dropped the connection
    #[error("Host unreachable: {0}")]
    HostUnreachable(String),

    /// Connection establishment or a transport read/write timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The server refused the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Path, site or directory entry does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target already exists and the operation does not overwrite
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Pre-transfer and post-transfer checksums differ
    #[error("Integrity check failed for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// Remote path of the rejected artifact
        path: String,
        /// Checksum of the local payload
        expected: String,
        /// Checksum of the remote read-back
        actual: String,
    },

    /// Caller-supplied argument is malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The transport gave no discriminable signal
    #[error("{0}")]
    Unknown(String),
}

/// Discriminant of [`Error`], cheap to copy and compare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AuthenticationFailure,
    HostUnreachable,
    Timeout,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    IntegrityMismatch,
    InvalidInput,
    Config,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::AuthenticationFailure => "AUTHENTICATION_FAILURE",
            ErrorKind::HostUnreachable => "HOST_UNREACHABLE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::IntegrityMismatch => "INTEGRITY_MISMATCH",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Serializable failure summary: kind plus detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
}

impl Error {
    /// Get the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AuthenticationFailure(_) => ErrorKind::AuthenticationFailure,
            Error::HostUnreachable(_) => ErrorKind::HostUnreachable,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::IntegrityMismatch { .. } => ErrorKind::IntegrityMismatch,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Config(_) => ErrorKind::Config,
            Error::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Check if the error means the underlying session can no longer be used
    ///
    /// Transport faults tear down the cached session; every other error
    /// leaves it in place for the next operation.
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Error::HostUnreachable(_) | Error::Timeout(_))
    }

    /// Check if error was caused by the request rather than the remote side
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::AlreadyExists(_)
                | Error::PermissionDenied(_)
                | Error::InvalidInput(_)
        )
    }

    /// Get an error message safe to hand back to end users
    ///
    /// Authentication details can name key formats or secret references, so
    /// they are collapsed to a fixed message.
    pub fn sanitized_message(&self) -> String {
        match self {
            Error::AuthenticationFailure(_) => "Authentication failed".to_string(),
            Error::Config(_) => "Client configuration error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Summarize as a serializable report
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            detail: self.to_string(),
        }
    }

    /// Append a note to the detail string, keeping the kind
    #[must_use]
    pub fn with_note(self, note: &str) -> Self {
        let extend = |detail: String| format!("{detail} ({note})");
        match self {
            Error::AuthenticationFailure(d) => Error::AuthenticationFailure(extend(d)),
            Error::HostUnreachable(d) => Error::HostUnreachable(extend(d)),
            Error::Timeout(d) => Error::Timeout(extend(d)),
            Error::PermissionDenied(d) => Error::PermissionDenied(extend(d)),
            Error::NotFound(d) => Error::NotFound(extend(d)),
            Error::AlreadyExists(d) => Error::AlreadyExists(extend(d)),
            Error::InvalidInput(d) => Error::InvalidInput(extend(d)),
            Error::Config(d) => Error::Config(extend(d)),
            Error::Unknown(d) => Error::Unknown(extend(d)),
            mismatch @ Error::IntegrityMismatch { .. } => mismatch,
        }
    }

    /// Create not found error with context
    pub fn not_found(context: impl Into<String>) -> Self {
        Error::NotFound(context.into())
    }

    /// Create invalid input error with context
    pub fn invalid_input(context: impl Into<String>) -> Self {
        Error::InvalidInput(context.into())
    }

    /// Create unknown error with context
    pub fn unknown(context: impl Into<String>) -> Self {
        Error::Unknown(context.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as IoKind;

        let detail = err.to_string();
        match err.kind() {
            IoKind::NotFound => Error::NotFound(detail),
            IoKind::PermissionDenied => Error::PermissionDenied(detail),
            IoKind::AlreadyExists => Error::AlreadyExists(detail),
            IoKind::TimedOut | IoKind::WouldBlock => Error::Timeout(detail),
            IoKind::ConnectionRefused
            | IoKind::ConnectionReset
            | IoKind::ConnectionAborted
            | IoKind::NotConnected
            | IoKind::BrokenPipe
            | IoKind::UnexpectedEof
            | IoKind::AddrNotAvailable => Error::HostUnreachable(detail),
            IoKind::InvalidInput => Error::InvalidInput(detail),
            _ => Error::Unknown(detail),
        }
    }
}
