//! Transfer integrity checks
//!
//! Checksums are lowercase hex SHA-256. Both sides of a comparison are
//! always computed by this module, so the encoding is stable within one
//! operation.

use sha2::{Digest, Sha256};

/// Computes and compares content digests for verified transfers
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferVerifier;

impl TransferVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Hex SHA-256 of `data`
    pub fn checksum(&self, data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Check the remote read-back against the digest taken before upload
    pub fn verify_upload(&self, local_digest: &str, remote_read_back: &[u8]) -> bool {
        self.checksum(remote_read_back)
            .eq_ignore_ascii_case(local_digest)
    }

    /// Digest returned alongside a downloaded payload
    pub fn verify_download(&self, data: &[u8]) -> String {
        self.checksum(data)
    }
}
