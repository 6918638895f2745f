use anyhow::{Context, Result};
use sitesync_sftp::ClientConfig;
use std::path::Path;
use tokio::fs;

pub async fn load_config(path: &Path) -> Result<ClientConfig> {
    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let config = ClientConfig::from_toml(&contents).context("Failed to parse configuration file")?;
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

pub async fn save_config(path: &Path, config: &ClientConfig) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    let contents = config
        .to_toml()
        .context("Failed to serialize configuration")?;

    fs::write(path, contents)
        .await
        .context("Failed to write configuration file")?;

    Ok(())
}
