//! # Sitesync SFTP
//!
//! Remote file transfer over SFTP for configured sites.
//!
//! ## Components
//!
//! - [`ConnectionManager`]: one cached, authenticated session per site
//! - [`ChannelFactory`]: one SFTP channel per operation
//! - [`FileOperationExecutor`]: list, upload, download, delete, mkdir,
//!   rename, chmod, stat and search
//! - [`TransferVerifier`]: SHA-256 checksums for verified transfers
//!
//! The transport is libssh2 (blocking). Public operations are async and run
//! the protocol work on tokio's blocking pool.

pub mod audit;
pub mod channel;
pub mod client;
pub mod config;
pub mod connection;
pub mod credentials;
pub mod executor;
pub mod host_key;
pub mod metrics;
pub mod paths;
pub mod progress;
pub mod protocol;
pub mod sites;
pub mod ssh;
pub mod transport;
pub mod verify;

pub use audit::{CompositeRecorder, JsonLinesRecorder, TracingRecorder};
pub use channel::ChannelFactory;
pub use client::ClientBuilder;
pub use config::{ClientConfig, LogFormat, LoggingConfig};
pub use connection::{ConnectionManager, SessionEntry, SessionHandle, SessionInfo};
pub use credentials::EnvCredentialProvider;
pub use executor::{
    ConnectionTestResult, DownloadOutcome, ExecutorOptions, FileOperationExecutor, UploadOptions,
};
pub use host_key::HostKeyVerifier;
pub use metrics::{Metrics, MetricsSnapshot};
pub use progress::{ProgressSink, ThrottledProgress};
pub use sites::StaticSiteDirectory;
pub use ssh::Ssh2Connector;
pub use transport::{Connector, PendingSession, RawEntry, RemoteChannel, RemoteSession};
pub use verify::TransferVerifier;

pub use sitesync_core::{Error, ErrorKind, Result};
