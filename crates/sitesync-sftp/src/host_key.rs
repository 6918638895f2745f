//! Server host key verification
//!
//! Fingerprints are hex SHA-256 of the raw host key blob. The known-hosts
//! file holds one `host:port fingerprint` pair per line; `#` starts a
//! comment.

use sitesync_core::{Error, HostKeyPolicy, Result, SiteDescriptor};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

/// Applies a site's host key policy to the fingerprint seen at handshake
#[derive(Debug, Default)]
pub struct HostKeyVerifier {
    known_hosts_file: Option<PathBuf>,
    pins: Mutex<HashMap<String, String>>,
}

/// Lowercase and drop `:` separators so `AB:CD` and `abcd` compare equal
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint
        .trim()
        .chars()
        .filter(|c| *c != ':')
        .flat_map(char::to_lowercase)
        .collect()
}

impl HostKeyVerifier {
    /// Verifier with in-memory pins only
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Verifier backed by a known-hosts file; a missing file starts empty
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pins = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!(
                    "Failed to read known hosts file {}: {e}",
                    path.display()
                ))
            })?;
            parse_known_hosts(&content)
        } else {
            HashMap::new()
        };

        Ok(Self {
            known_hosts_file: Some(path),
            pins: Mutex::new(pins),
        })
    }

    /// Pinned fingerprint for `host:port`, if any
    pub fn pinned(&self, address: &str) -> Option<String> {
        self.pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
    }

    /// Decide whether the presented host key is acceptable
    ///
    /// Rejections are `AuthenticationFailure` so that no credential is sent
    /// to an unverified host.
    pub fn verify(&self, site: &SiteDescriptor, presented: Option<&str>) -> Result<()> {
        let address = site.address();

        if site.host_key_policy == HostKeyPolicy::Disabled {
            warn!(
                site_id = %site.id,
                address = %address,
                event = "host_key_unchecked",
                "Host key verification disabled for site"
            );
            return Ok(());
        }

        let Some(presented) = presented.map(normalize_fingerprint) else {
            return Err(Error::AuthenticationFailure(format!(
                "{address} presented no host key"
            )));
        };

        let expected = site
            .known_host_fingerprint
            .as_deref()
            .map(normalize_fingerprint)
            .or_else(|| self.pinned(&address));

        match (site.host_key_policy, expected) {
            (_, Some(expected)) if expected == presented => Ok(()),
            (_, Some(expected)) => {
                warn!(
                    site_id = %site.id,
                    address = %address,
                    expected = %expected,
                    presented = %presented,
                    event = "host_key_mismatch",
                    "Host key does not match the known fingerprint"
                );
                Err(Error::AuthenticationFailure(format!(
                    "Host key for {address} does not match the known fingerprint"
                )))
            }
            (HostKeyPolicy::Enforce, None) => Err(Error::AuthenticationFailure(format!(
                "No known host key for {address}"
            ))),
            (_, None) => {
                self.pin(&address, &presented);
                Ok(())
            }
        }
    }

    fn pin(&self, address: &str, fingerprint: &str) {
        self.pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.to_string(), fingerprint.to_string());

        info!(
            address = %address,
            fingerprint = %fingerprint,
            event = "host_key_pinned",
            "Trusting host key on first use"
        );

        if let Some(path) = &self.known_hosts_file
            && let Err(e) = append_pin(path, address, fingerprint)
        {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to persist host key pin; it is kept for this process only"
            );
        }
    }
}

fn parse_known_hosts(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let address = parts.next()?;
            let fingerprint = parts.next()?;
            Some((address.to_string(), normalize_fingerprint(fingerprint)))
        })
        .collect()
}

fn append_pin(path: &Path, address: &str, fingerprint: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{address} {fingerprint}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesync_core::{ErrorKind, SiteId};
    use tempfile::TempDir;

    fn site(policy: HostKeyPolicy, fingerprint: Option<&str>) -> SiteDescriptor {
        SiteDescriptor {
            id: SiteId(1),
            name: String::new(),
            host: "files.example.com".into(),
            port: 22,
            username: "deploy".into(),
            secret_ref: "plain:x".into(),
            private_key: None,
            target_root: "/".into(),
            host_key_policy: policy,
            known_host_fingerprint: fingerprint.map(str::to_string),
        }
    }

    #[test]
    fn test_enforce_requires_known_key() {
        let verifier = HostKeyVerifier::in_memory();
        let err = verifier
            .verify(&site(HostKeyPolicy::Enforce, None), Some("aa"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
    }

    #[test]
    fn test_enforce_accepts_matching_key() {
        let verifier = HostKeyVerifier::in_memory();
        let site = site(HostKeyPolicy::Enforce, Some("AA:BB:CC"));
        assert!(verifier.verify(&site, Some("aabbcc")).is_ok());
        assert!(verifier.verify(&site, Some("aabbcd")).is_err());
    }

    #[test]
    fn test_trust_on_first_use_pins_and_rejects_change() {
        let verifier = HostKeyVerifier::in_memory();
        let site = site(HostKeyPolicy::TrustOnFirstUse, None);

        assert!(verifier.verify(&site, Some("1111")).is_ok());
        assert_eq!(verifier.pinned("files.example.com:22").as_deref(), Some("1111"));
        assert!(verifier.verify(&site, Some("1111")).is_ok());

        let err = verifier.verify(&site, Some("2222")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
    }

    #[test]
    fn test_disabled_accepts_anything() {
        let verifier = HostKeyVerifier::in_memory();
        let site = site(HostKeyPolicy::Disabled, Some("aa"));
        assert!(verifier.verify(&site, Some("bb")).is_ok());
        assert!(verifier.verify(&site, None).is_ok());
    }

    #[test]
    fn test_missing_host_key_rejected() {
        let verifier = HostKeyVerifier::in_memory();
        let site = site(HostKeyPolicy::TrustOnFirstUse, None);
        assert!(verifier.verify(&site, None).is_err());
    }

    #[test]
    fn test_pins_persist_to_known_hosts_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("known_hosts");

        let verifier = HostKeyVerifier::load(&path).unwrap();
        let site = site(HostKeyPolicy::TrustOnFirstUse, None);
        verifier.verify(&site, Some("DEADBEEF")).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "files.example.com:22 deadbeef\n");

        let reloaded = HostKeyVerifier::load(&path).unwrap();
        assert_eq!(reloaded.pinned("files.example.com:22").as_deref(), Some("deadbeef"));
        assert!(reloaded.verify(&site, Some("feedface")).is_err());
    }

    #[test]
    fn test_parse_known_hosts_skips_comments() {
        let pins = parse_known_hosts("# pinned\n\nhost:22 AB:CD\nbroken-line\n");
        assert_eq!(pins.len(), 1);
        assert_eq!(pins.get("host:22").map(String::as_str), Some("abcd"));
    }
}
