use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use sitesync_sftp::{ClientBuilder, ClientConfig, FileOperationExecutor, UploadOptions};
use std::io::Write;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::FileCommands;

pub async fn handle(config: ClientConfig, command: FileCommands) -> Result<()> {
    let executor = ClientBuilder::new(config)
        .build()
        .context("Failed to initialise transfer client")?;

    let result = run(&executor, command).await;

    let closed = executor.close_all_sessions().await;
    info!(closed, summary = %executor.metrics().snapshot().summary(), "Done");

    result
}

async fn run(executor: &FileOperationExecutor, command: FileCommands) -> Result<()> {
    match command {
        FileCommands::Ls { site, path } => {
            let entries = executor.list_files(site, &path).await?;
            print_json(&entries)?;
        }
        FileCommands::Put {
            site,
            local,
            remote,
            verify,
            no_overwrite,
            progress,
        } => {
            let data = fs::read(&local)
                .await
                .with_context(|| format!("Failed to read {}", local.display()))?;

            let mut options = UploadOptions {
                verify,
                overwrite: no_overwrite.then_some(false),
                progress: None,
            };
            if progress {
                options = options.with_progress(Arc::new(|done: u64, total: u64| {
                    eprintln!("{done}/{total} bytes");
                }));
            }

            let outcome = executor.upload_file(site, &remote, data, options).await?;
            print_json(&outcome)?;
        }
        FileCommands::Get {
            site,
            remote,
            output,
        } => {
            let outcome = executor.download_file(site, &remote).await?;
            match output {
                Some(path) => {
                    fs::write(&path, &outcome.data)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    print_json(&json!({
                        "path": remote,
                        "output": path,
                        "bytes": outcome.data.len(),
                        "checksum": outcome.checksum,
                    }))?;
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&outcome.data)?;
                    stdout.flush()?;
                    info!(checksum = %outcome.checksum, bytes = outcome.data.len(), "Downloaded");
                }
            }
        }
        FileCommands::Rm {
            site,
            path,
            recursive,
        } => {
            executor.delete_file(site, &path, recursive).await?;
            print_json(&json!({ "deleted": path, "recursive": recursive }))?;
        }
        FileCommands::Mkdir {
            site,
            path,
            parents,
        } => {
            executor.create_directory(site, &path, parents).await?;
            print_json(&json!({ "created": path }))?;
        }
        FileCommands::Mv { site, from, to } => {
            executor.rename_file(site, &from, &to).await?;
            print_json(&json!({ "from": from, "to": to }))?;
        }
        FileCommands::Chmod { site, mode, path } => {
            executor.change_permissions(site, &path, &mode).await?;
            print_json(&json!({ "path": path, "mode": mode }))?;
        }
        FileCommands::Info { site, path } => {
            let entry = executor.get_file_info(site, &path).await?;
            print_json(&entry)?;
        }
        FileCommands::Find {
            site,
            term,
            base,
            recursive,
        } => {
            let matches = executor.search_files(site, &term, &base, recursive).await?;
            print_json(&matches)?;
        }
        FileCommands::Test { site } => {
            let result = executor.test_connection(site).await;
            print_json(&result)?;
            if !result.success {
                anyhow::bail!("Connection test for site {site} failed");
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
