//! Collaborators the transfer engine consumes but does not own
//!
//! Site records, secret decryption and transaction-log storage live outside
//! the engine; these traits are the seams it calls through.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::Result;
use crate::types::{Secret, SiteDescriptor, SiteId, TransactionRecord};

/// Resolves site identifiers to connection descriptors
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Look up a site; fails with `Error::NotFound` for unknown ids
    async fn find(&self, site_id: SiteId) -> Result<SiteDescriptor>;
}

/// Provider-specific decryption failure
#[derive(Error, Debug)]
#[error("{0}")]
pub struct CredentialError(pub String);

/// Turns a stored secret reference into a usable secret
pub trait CredentialProvider: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> std::result::Result<Secret, CredentialError>;
}

/// Recorder-side failure; never aborts the operation being recorded
#[derive(Error, Debug)]
#[error("{0}")]
pub struct RecorderError(pub String);

/// Receives one record per completed operation
pub trait TransactionRecorder: Send + Sync {
    fn record(&self, record: &TransactionRecord) -> std::result::Result<(), RecorderError>;
}
