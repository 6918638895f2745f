use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, ErrorReport};

/// Identifier of a configured remote site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(pub u64);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SiteId {
    fn from(id: u64) -> Self {
        SiteId(id)
    }
}

impl std::str::FromStr for SiteId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(SiteId)
            .map_err(|_| Error::invalid_input(format!("Invalid site id: {s}")))
    }
}

/// How the server host key is checked when a session is established
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Host key must match the descriptor fingerprint or a stored pin
    Enforce,
    /// Pin the first fingerprint seen, reject changes afterwards
    #[default]
    TrustOnFirstUse,
    /// Accept any host key
    Disabled,
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKeyPolicy::Enforce => write!(f, "enforce"),
            HostKeyPolicy::TrustOnFirstUse => write!(f, "trust_on_first_use"),
            HostKeyPolicy::Disabled => write!(f, "disabled"),
        }
    }
}

/// Connection parameters for one remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub id: SiteId,
    #[serde(default)]
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    /// Reference handed to the credential provider, never the plaintext
    pub secret_ref: String,
    /// PEM private key; when present the decrypted secret is its passphrase
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default = "default_target_root")]
    pub target_root: String,
    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,
    /// Hex SHA-256 of the expected server host key
    #[serde(default)]
    pub known_host_fingerprint: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_target_root() -> String {
    "/".to_string()
}

impl SiteDescriptor {
    /// `host:port` string used for connecting and for host-key pins
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Display label: the site name, falling back to the address
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.address()
        } else {
            self.name.clone()
        }
    }
}

/// Decrypted secret material; never printed
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// What a session authenticates with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Password(Secret),
    PrivateKey {
        key_pem: String,
        passphrase: Option<Secret>,
    },
}

impl Credential {
    /// Build the credential for a site from its decrypted secret
    ///
    /// Sites that carry key material use the secret as the key passphrase;
    /// an empty secret means an unencrypted key.
    pub fn for_site(site: &SiteDescriptor, secret: Secret) -> Self {
        match site.private_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Credential::PrivateKey {
                key_pem: key.to_string(),
                passphrase: (!secret.is_empty()).then_some(secret),
            },
            _ => Credential::Password(secret),
        }
    }

    /// Authentication method name for logs
    pub fn method(&self) -> &'static str {
        match self {
            Credential::Password(_) => "password",
            Credential::PrivateKey { .. } => "publickey",
        }
    }
}

/// One directory entry or stat result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    /// `ls -l` style string, e.g. `drwxr-xr-x`
    pub permissions: String,
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accessed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub uid: Option<u32>,
    #[serde(default)]
    pub gid: Option<u32>,
}

/// Result of one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub success: bool,
    pub bytes_transferred: u64,
    pub checksum: Option<String>,
    pub verified: bool,
    pub error: Option<ErrorReport>,
}

impl TransferOutcome {
    pub fn completed(bytes_transferred: u64, checksum: Option<String>, verified: bool) -> Self {
        Self {
            success: true,
            bytes_transferred,
            checksum,
            verified,
            error: None,
        }
    }
}

/// Operation names written to the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    ListFiles,
    UploadFile,
    DownloadFile,
    DeleteFile,
    CreateDirectory,
    RenameFile,
    ChangePermissions,
    FileInfo,
    SearchFiles,
    ConnectionTest,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ListFiles => "LIST_FILES",
            ActionType::UploadFile => "UPLOAD_FILE",
            ActionType::DownloadFile => "DOWNLOAD_FILE",
            ActionType::DeleteFile => "DELETE_FILE",
            ActionType::CreateDirectory => "CREATE_DIRECTORY",
            ActionType::RenameFile => "RENAME_FILE",
            ActionType::ChangePermissions => "CHANGE_PERMISSIONS",
            ActionType::FileInfo => "FILE_INFO",
            ActionType::SearchFiles => "SEARCH_FILES",
            ActionType::ConnectionTest => "CONNECTION_TEST",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one operation as handed to the transaction recorder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub site_id: SiteId,
    pub action: ActionType,
    /// Affected path; renames use `old -> new`
    pub path: String,
    pub checksum: Option<String>,
    pub success: bool,
    pub detail: String,
    pub bytes: Option<u64>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}
