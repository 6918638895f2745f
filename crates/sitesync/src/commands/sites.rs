use anyhow::Result;
use serde_json::json;
use sitesync_sftp::ClientConfig;

/// Print the configured sites without their secret references
pub fn list(config: &ClientConfig) -> Result<()> {
    let sites: Vec<_> = config
        .sites
        .iter()
        .map(|site| {
            json!({
                "id": site.id,
                "name": site.label(),
                "address": site.address(),
                "username": site.username,
                "target_root": site.target_root,
                "host_key_policy": site.host_key_policy,
                "auth": if site.private_key.is_some() { "publickey" } else { "password" },
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&sites)?);
    Ok(())
}
