use anyhow::Result;
use sitesync_core::{HostKeyPolicy, SiteDescriptor, SiteId};
use sitesync_sftp::ClientConfig;
use std::path::Path;

use crate::config;

pub async fn init_config(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to replace it)",
            config_path.display()
        );
    }

    config::save_config(config_path, &starter_config()).await?;

    println!("Configuration file created at: {}", config_path.display());
    println!("Set SITESYNC_EXAMPLE_PASSWORD or edit secret_ref before connecting.");
    Ok(())
}

fn starter_config() -> ClientConfig {
    ClientConfig {
        known_hosts_file: Some("/var/lib/sitesync/known_hosts".into()),
        audit_file: Some("/var/log/sitesync/transactions.jsonl".into()),
        sites: vec![SiteDescriptor {
            id: SiteId(1),
            name: "example".into(),
            host: "sftp.example.com".into(),
            port: 22,
            username: "deploy".into(),
            secret_ref: "env:SITESYNC_EXAMPLE_PASSWORD".into(),
            private_key: None,
            target_root: "/var/www".into(),
            host_key_policy: HostKeyPolicy::TrustOnFirstUse,
            known_host_fingerprint: None,
        }],
        ..ClientConfig::default()
    }
}
