//! Shared types, error taxonomy and collaborator traits for Sitesync.
//!
//! The remote-file-transfer engine lives in `sitesync-sftp`; this crate holds
//! what both the engine and its callers need to agree on.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, ErrorKind, ErrorReport, Result};
pub use traits::{
    CredentialError, CredentialProvider, RecorderError, SiteDirectory, TransactionRecorder,
};
pub use types::*;
