//! File and directory operations against remote sites
//!
//! Every public operation follows the same path: acquire the site's cached
//! session, run the protocol work on a blocking worker with its own channel,
//! then hand one [`TransactionRecord`] to the recorder. A transport fault
//! invalidates the cached session; every other error leaves it in place.

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use sitesync_core::{
    ActionType, Error, ErrorKind, FileEntry, Result, SiteId, TransactionRecord,
    TransactionRecorder, TransferOutcome,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::channel::ChannelFactory;
use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, SessionHandle};
use crate::metrics::{Metrics, OperationTimer};
use crate::paths;
use crate::progress::{ProgressSink, ThrottledProgress};
use crate::protocol;
use crate::transport::{RawEntry, RemoteChannel};
use crate::verify::TransferVerifier;

/// Mode for directories created by `create_directory`
const DIR_MODE: u32 = 0o755;

/// Tunables shared by every operation
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub transfer_chunk_size: usize,
    pub progress_interval_bytes: u64,
    /// Upload default when `UploadOptions::overwrite` is unset
    pub overwrite_uploads: bool,
    pub overwrite_on_rename: bool,
}

impl ExecutorOptions {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            transfer_chunk_size: config.transfer_chunk_size,
            progress_interval_bytes: config.progress_interval_bytes,
            overwrite_uploads: config.overwrite_uploads,
            overwrite_on_rename: config.overwrite_on_rename,
        }
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Per-call upload settings
#[derive(Clone, Default)]
pub struct UploadOptions {
    /// Read the file back and compare checksums after writing
    pub verify: bool,
    /// Replace an existing file; `None` uses the configured default
    pub overwrite: Option<bool>,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl UploadOptions {
    pub fn verified() -> Self {
        Self {
            verify: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = Some(overwrite);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("verify", &self.verify)
            .field("overwrite", &self.overwrite)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Downloaded payload and its checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub data: Bytes,
    pub checksum: String,
}

/// Result of probing a site
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestResult {
    pub site_id: SiteId,
    pub success: bool,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
    pub response_time_ms: u64,
    /// Entries in the site's target root
    pub entries: Option<usize>,
}

/// In-flight bookkeeping for the transaction record
struct Operation {
    site_id: SiteId,
    action: ActionType,
    path: String,
    checksum: Option<String>,
    bytes: Option<u64>,
    timer: OperationTimer,
}

/// Settings captured by the upload worker
struct UploadPlan {
    verify: bool,
    overwrite: bool,
    chunk_size: usize,
    progress_interval: u64,
    progress: Option<Arc<dyn ProgressSink>>,
    verifier: TransferVerifier,
}

/// Runs file operations over cached sessions
pub struct FileOperationExecutor {
    connections: Arc<ConnectionManager>,
    channels: ChannelFactory,
    verifier: TransferVerifier,
    recorder: Arc<dyn TransactionRecorder>,
    metrics: Metrics,
    options: ExecutorOptions,
}

impl FileOperationExecutor {
    pub fn new(
        connections: Arc<ConnectionManager>,
        recorder: Arc<dyn TransactionRecorder>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            channels: ChannelFactory::new(connections.connect_timeout()),
            metrics: connections.metrics().clone(),
            verifier: TransferVerifier::new(),
            connections,
            recorder,
            options,
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Close the cached session for one site
    pub async fn close_session(&self, site_id: SiteId) -> bool {
        self.connections.close_session(site_id).await
    }

    /// Close every cached session
    pub async fn close_all_sessions(&self) -> usize {
        self.connections.close_all().await
    }

    /// List the immediate children of `path`, directories first
    pub async fn list_files(&self, site_id: SiteId, path: &str) -> Result<Vec<FileEntry>> {
        let mut op = self.begin(site_id, ActionType::ListFiles, path);
        let result = self.list_files_in(&mut op, path).await;
        self.complete(op, &result, |entries| {
            format!("Listed {} entries", entries.len())
        });
        result
    }

    async fn list_files_in(&self, op: &mut Operation, path: &str) -> Result<Vec<FileEntry>> {
        let (handle, target) = self.session(op, path).await?;
        self.with_channel(&handle, move |channel| list_dir(channel, &target))
            .await
    }

    /// Write `data` to `path`
    ///
    /// With `verify`, the file is read back after writing; on a checksum
    /// mismatch it is removed and `IntegrityMismatch` is returned.
    pub async fn upload_file(
        &self,
        site_id: SiteId,
        path: &str,
        data: impl Into<Bytes>,
        options: UploadOptions,
    ) -> Result<TransferOutcome> {
        let mut op = self.begin(site_id, ActionType::UploadFile, path);
        let result = self.upload_file_in(&mut op, path, data.into(), options).await;
        self.complete(op, &result, |outcome| {
            if outcome.verified {
                format!("Uploaded {} bytes (verified)", outcome.bytes_transferred)
            } else {
                format!("Uploaded {} bytes", outcome.bytes_transferred)
            }
        });
        result
    }

    async fn upload_file_in(
        &self,
        op: &mut Operation,
        path: &str,
        data: Bytes,
        options: UploadOptions,
    ) -> Result<TransferOutcome> {
        let (handle, target) = self.session(op, path).await?;
        if paths::parent(&target).is_none() {
            return Err(Error::invalid_input("Upload target must name a file"));
        }

        let plan = UploadPlan {
            verify: options.verify,
            overwrite: options.overwrite.unwrap_or(self.options.overwrite_uploads),
            chunk_size: self.options.transfer_chunk_size,
            progress_interval: self.options.progress_interval_bytes,
            progress: options.progress,
            verifier: self.verifier,
        };

        let result = self
            .with_channel(&handle, move |channel| upload(channel, &target, &data, &plan))
            .await;

        match &result {
            Ok(outcome) => {
                op.checksum.clone_from(&outcome.checksum);
                op.bytes = Some(outcome.bytes_transferred);
                self.metrics
                    .record_upload(outcome.bytes_transferred, outcome.verified);
            }
            Err(Error::IntegrityMismatch { expected, .. }) => {
                op.checksum = Some(expected.clone());
            }
            Err(_) => {}
        }
        result
    }

    /// Read the file at `path` and return it with its checksum
    pub async fn download_file(&self, site_id: SiteId, path: &str) -> Result<DownloadOutcome> {
        let mut op = self.begin(site_id, ActionType::DownloadFile, path);
        let result = self.download_file_in(&mut op, path).await;
        self.complete(op, &result, |outcome| {
            format!("Downloaded {} bytes", outcome.data.len())
        });
        result
    }

    async fn download_file_in(&self, op: &mut Operation, path: &str) -> Result<DownloadOutcome> {
        let (handle, target) = self.session(op, path).await?;
        let verifier = self.verifier;

        let outcome = self
            .with_channel(&handle, move |channel| {
                let attrs = channel.stat(&target)?;
                if attrs.is_dir() {
                    return Err(Error::not_found(format!("{target} is a directory")));
                }
                let data = channel.read_file(&target)?;
                let checksum = verifier.verify_download(&data);
                Ok(DownloadOutcome {
                    data: Bytes::from(data),
                    checksum,
                })
            })
            .await?;

        let size = outcome.data.len() as u64;
        op.checksum = Some(outcome.checksum.clone());
        op.bytes = Some(size);
        self.metrics.record_download(size);
        Ok(outcome)
    }

    /// Remove a file or directory
    ///
    /// A directory is removed only if empty unless `recursive` is set, in
    /// which case its contents are removed bottom-up first. If a recursive
    /// delete fails part way, entries already removed stay removed and the
    /// error detail reports how many there were.
    pub async fn delete_file(&self, site_id: SiteId, path: &str, recursive: bool) -> Result<()> {
        let mut op = self.begin(site_id, ActionType::DeleteFile, path);
        let result = self.delete_file_in(&mut op, path, recursive).await;
        self.complete(op, &result, |removed| format!("Removed {removed} entries"));
        result.map(|_| ())
    }

    async fn delete_file_in(&self, op: &mut Operation, path: &str, recursive: bool) -> Result<u64> {
        let (handle, target) = self.session(op, path).await?;
        if target == "/" {
            return Err(Error::invalid_input("Refusing to delete the filesystem root"));
        }

        self.with_channel(&handle, move |channel| delete(channel, &target, recursive))
            .await
    }

    /// Create a directory, or with `recursive` every missing segment of it
    pub async fn create_directory(
        &self,
        site_id: SiteId,
        path: &str,
        recursive: bool,
    ) -> Result<()> {
        let mut op = self.begin(site_id, ActionType::CreateDirectory, path);
        let result = self.create_directory_in(&mut op, path, recursive).await;
        self.complete(op, &result, |created| {
            format!("Created {created} directories")
        });
        result.map(|_| ())
    }

    async fn create_directory_in(
        &self,
        op: &mut Operation,
        path: &str,
        recursive: bool,
    ) -> Result<usize> {
        let (handle, target) = self.session(op, path).await?;
        self.with_channel(&handle, move |channel| {
            if recursive {
                create_dir_all(channel, &target)
            } else {
                create_dir(channel, &target).map(|()| 1)
            }
        })
        .await
    }

    /// Rename `old_path` to `new_path`
    ///
    /// Fails with `AlreadyExists` when the target exists and renames are not
    /// configured to overwrite.
    pub async fn rename_file(&self, site_id: SiteId, old_path: &str, new_path: &str) -> Result<()> {
        let mut op = self.begin(site_id, ActionType::RenameFile, old_path);
        let result = self.rename_file_in(&mut op, old_path, new_path).await;
        self.complete(op, &result, |_| "Renamed".to_string());
        result
    }

    async fn rename_file_in(&self, op: &mut Operation, old_path: &str, new_path: &str) -> Result<()> {
        let (handle, from) = self.session(op, old_path).await?;
        let to = paths::resolve(&handle.site().target_root, new_path)?;
        op.path = format!("{from} -> {to}");

        if from == to {
            return Err(Error::invalid_input(
                "Source and destination of a rename are the same path",
            ));
        }

        let overwrite = self.options.overwrite_on_rename;
        self.with_channel(&handle, move |channel| {
            channel.lstat(&from).map_err(|e| match e {
                Error::NotFound(_) => Error::not_found(format!("{from} does not exist")),
                other => other,
            })?;

            if !overwrite {
                match channel.lstat(&to) {
                    Ok(_) => return Err(Error::AlreadyExists(format!("{to} already exists"))),
                    Err(Error::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }

            channel.rename(&from, &to, overwrite)
        })
        .await
    }

    /// Set permission bits from an octal string such as `755`
    pub async fn change_permissions(&self, site_id: SiteId, path: &str, mode: &str) -> Result<()> {
        let mut op = self.begin(site_id, ActionType::ChangePermissions, path);
        let result = self.change_permissions_in(&mut op, path, mode).await;
        self.complete(op, &result, |bits| format!("Permissions set to {bits:04o}"));
        result.map(|_| ())
    }

    async fn change_permissions_in(&self, op: &mut Operation, path: &str, mode: &str) -> Result<u32> {
        let bits = protocol::parse_mode(mode)?;
        let (handle, target) = self.session(op, path).await?;
        self.with_channel(&handle, move |channel| channel.set_permissions(&target, bits))
            .await?;
        Ok(bits)
    }

    /// Stat a single path
    pub async fn get_file_info(&self, site_id: SiteId, path: &str) -> Result<FileEntry> {
        let mut op = self.begin(site_id, ActionType::FileInfo, path);
        let result = self.get_file_info_in(&mut op, path).await;
        self.complete(op, &result, |entry| {
            if entry.is_directory {
                "Directory info retrieved".to_string()
            } else {
                format!("File info retrieved ({} bytes)", entry.size)
            }
        });
        result
    }

    async fn get_file_info_in(&self, op: &mut Operation, path: &str) -> Result<FileEntry> {
        let (handle, target) = self.session(op, path).await?;
        self.with_channel(&handle, move |channel| {
            let attrs = channel.stat(&target)?;
            Ok(attrs.to_entry(paths::file_name(&target), &target))
        })
        .await
    }

    /// Case-insensitive substring search on entry names under `base_path`
    ///
    /// With `recursive`, matches are returned in pre-order: a directory's
    /// matches come right after the directory itself, before its later
    /// siblings.
    pub async fn search_files(
        &self,
        site_id: SiteId,
        term: &str,
        base_path: &str,
        recursive: bool,
    ) -> Result<Vec<FileEntry>> {
        let mut op = self.begin(site_id, ActionType::SearchFiles, base_path);
        let result = self.search_files_in(&mut op, term, base_path, recursive).await;
        self.complete(op, &result, |matches| {
            format!("Found {} matches for {term:?}", matches.len())
        });
        result
    }

    async fn search_files_in(
        &self,
        op: &mut Operation,
        term: &str,
        base_path: &str,
        recursive: bool,
    ) -> Result<Vec<FileEntry>> {
        let needle = term.to_lowercase();
        if needle.is_empty() {
            return Err(Error::invalid_input("Search term must not be empty"));
        }

        let (handle, base) = self.session(op, base_path).await?;
        self.with_channel(&handle, move |channel| {
            search(channel, &base, &needle, recursive)
        })
        .await
    }

    /// Open a session and list the site's target root
    ///
    /// Never fails; the outcome is described by the returned value.
    pub async fn test_connection(&self, site_id: SiteId) -> ConnectionTestResult {
        let mut op = self.begin(site_id, ActionType::ConnectionTest, "");
        let result = self.test_connection_in(&mut op).await;
        let response_time_ms = op.timer.elapsed_ms();
        self.complete(op, &result, |_| "Connection test successful".to_string());

        match result {
            Ok(entries) => ConnectionTestResult {
                site_id,
                success: true,
                message: "Connection successful".to_string(),
                error_kind: None,
                response_time_ms,
                entries: Some(entries),
            },
            Err(e) => ConnectionTestResult {
                site_id,
                success: false,
                message: format!("Connection failed: {}", e.sanitized_message()),
                error_kind: Some(e.kind()),
                response_time_ms,
                entries: None,
            },
        }
    }

    async fn test_connection_in(&self, op: &mut Operation) -> Result<usize> {
        let (handle, root) = self.session(op, "").await?;
        self.with_channel(&handle, move |channel| {
            list_dir(channel, &root).map(|entries| entries.len())
        })
        .await
    }

    fn begin(&self, site_id: SiteId, action: ActionType, path: &str) -> Operation {
        debug!(site_id = %site_id, action = %action, path, "Starting operation");
        Operation {
            site_id,
            action,
            path: path.to_string(),
            checksum: None,
            bytes: None,
            timer: self.metrics.start_timer(action),
        }
    }

    /// Acquire the site's session and resolve `path` against its root
    async fn session(&self, op: &mut Operation, path: &str) -> Result<(SessionHandle, String)> {
        let handle = self.connections.get_or_create_session(op.site_id).await?;
        let target = paths::resolve(&handle.site().target_root, path)?;
        op.path.clone_from(&target);
        Ok((handle, target))
    }

    /// Run blocking protocol work on its own channel
    async fn with_channel<T, F>(&self, handle: &SessionHandle, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn RemoteChannel) -> Result<T> + Send + 'static,
    {
        let channels = self.channels;
        let worker_handle = handle.clone();

        let result = tokio::task::spawn_blocking(move || {
            let channel = channels.open(&worker_handle)?;
            work(channel.as_ref())
        })
        .await
        .map_err(|e| Error::unknown(format!("Operation worker failed: {e}")))?;

        if let Err(e) = &result
            && e.is_transport_fault()
        {
            self.connections.invalidate(handle).await;
        }
        result
    }

    fn complete<T>(&self, op: Operation, result: &Result<T>, describe: impl FnOnce(&T) -> String) {
        let (success, detail) = match result {
            Ok(value) => (true, describe(value)),
            Err(e) => (false, e.to_string()),
        };
        self.metrics.record_operation(result.as_ref().map(|_| ()));

        match result {
            Err(e) if e.is_client_error() => debug!(
                site_id = %op.site_id,
                action = %op.action,
                path = %op.path,
                kind = %e.kind(),
                "Operation rejected"
            ),
            Err(e) => warn!(
                site_id = %op.site_id,
                action = %op.action,
                path = %op.path,
                kind = %e.kind(),
                error = %e.sanitized_message(),
                "Operation failed"
            ),
            Ok(_) => {}
        }

        let record = TransactionRecord {
            id: Uuid::new_v4(),
            site_id: op.site_id,
            action: op.action,
            path: op.path,
            checksum: op.checksum,
            success,
            detail,
            bytes: op.bytes,
            duration_ms: op.timer.elapsed_ms(),
            timestamp: Utc::now(),
        };

        if let Err(e) = self.recorder.record(&record) {
            warn!(
                site_id = %record.site_id,
                action = %record.action,
                transaction_id = %record.id,
                error = %e,
                "Transaction recorder failed; operation result unaffected"
            );
        }
    }
}

impl fmt::Debug for FileOperationExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileOperationExecutor")
            .field("connections", &self.connections)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn is_pseudo_entry(entry: &RawEntry) -> bool {
    entry.name == "." || entry.name == ".."
}

/// Directories first, each group ordered case-insensitively by name
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn list_dir(channel: &dyn RemoteChannel, dir: &str) -> Result<Vec<FileEntry>> {
    let mut entries: Vec<FileEntry> = channel
        .read_dir(dir)?
        .into_iter()
        .filter(|entry| !is_pseudo_entry(entry))
        .map(|entry| entry.attrs.to_entry(&entry.name, &paths::join(dir, &entry.name)))
        .collect();
    sort_entries(&mut entries);
    Ok(entries)
}

fn upload(
    channel: &dyn RemoteChannel,
    target: &str,
    data: &[u8],
    plan: &UploadPlan,
) -> Result<TransferOutcome> {
    match channel.stat(target) {
        Ok(attrs) if attrs.is_dir() => {
            return Err(Error::invalid_input(format!("{target} is a directory")));
        }
        Ok(_) if !plan.overwrite => {
            return Err(Error::AlreadyExists(format!("{target} already exists")));
        }
        Ok(_) | Err(Error::NotFound(_)) => {}
        Err(e) => return Err(e),
    }

    let total = data.len() as u64;
    let checksum = plan.verifier.checksum(data);

    let mut progress = plan
        .progress
        .clone()
        .map(|sink| ThrottledProgress::new(sink, total, plan.progress_interval));
    let mut on_progress = |done: u64| {
        if let Some(progress) = progress.as_mut() {
            progress.update(done);
        }
    };
    channel.write_file(target, data, !plan.overwrite, plan.chunk_size, &mut on_progress)?;

    if plan.verify {
        let read_back = channel.read_file(target)?;
        if !plan.verifier.verify_upload(&checksum, &read_back) {
            let actual = plan.verifier.checksum(&read_back);
            match channel.unlink(target) {
                Ok(()) => warn!(
                    path = target,
                    expected = %checksum,
                    actual = %actual,
                    event = "integrity_mismatch",
                    "Checksum mismatch after upload; removed remote file"
                ),
                Err(e) => error!(
                    path = target,
                    error = %e,
                    event = "integrity_cleanup_failed",
                    "Checksum mismatch after upload and the remote file could not be removed"
                ),
            }
            return Err(Error::IntegrityMismatch {
                path: target.to_string(),
                expected: checksum,
                actual,
            });
        }
    }

    if let Some(progress) = progress.as_mut() {
        progress.finish();
    }

    Ok(TransferOutcome::completed(total, Some(checksum), plan.verify))
}

fn delete(channel: &dyn RemoteChannel, target: &str, recursive: bool) -> Result<u64> {
    let attrs = channel.lstat(target)?;
    if !attrs.is_dir() {
        channel.unlink(target)?;
        return Ok(1);
    }
    if !recursive {
        channel.rmdir(target)?;
        return Ok(1);
    }
    remove_tree(channel, target)
}

/// Post-order removal with an explicit stack of `(dir, expanded)` frames
fn remove_tree(channel: &dyn RemoteChannel, root: &str) -> Result<u64> {
    let partial = |err: Error, removed: u64| {
        if removed == 0 {
            err
        } else {
            err.with_note(&format!("recursive delete stopped after removing {removed} entries"))
        }
    };

    let mut removed = 0u64;
    let mut stack = vec![(root.to_string(), false)];

    while let Some((dir, expanded)) = stack.pop() {
        if expanded {
            channel.rmdir(&dir).map_err(|e| partial(e, removed))?;
            removed += 1;
            continue;
        }

        let entries = channel.read_dir(&dir).map_err(|e| partial(e, removed))?;
        stack.push((dir.clone(), true));

        for entry in entries.into_iter().filter(|entry| !is_pseudo_entry(entry)) {
            let child = paths::join(&dir, &entry.name);
            // Symlinks are removed, never followed
            if entry.attrs.is_dir() {
                stack.push((child, false));
            } else {
                channel.unlink(&child).map_err(|e| partial(e, removed))?;
                removed += 1;
            }
        }
    }

    Ok(removed)
}

fn create_dir(channel: &dyn RemoteChannel, target: &str) -> Result<()> {
    match channel.mkdir(target, DIR_MODE) {
        Ok(()) => Ok(()),
        Err(e) if e.is_transport_fault() => Err(e),
        Err(e) => Err(classify_mkdir_failure(channel, target, e)),
    }
}

/// Work out why a single mkdir failed
fn classify_mkdir_failure(channel: &dyn RemoteChannel, target: &str, err: Error) -> Error {
    if channel.stat(target).is_ok() {
        return Error::AlreadyExists(format!("{target} already exists"));
    }

    if let Some(parent) = paths::parent(target) {
        match channel.stat(parent) {
            Err(Error::NotFound(_)) => {
                return Error::not_found(format!("Parent directory {parent} does not exist"));
            }
            Ok(attrs) if !attrs.is_dir() => {
                return Error::not_found(format!("Parent {parent} is not a directory"));
            }
            _ => {}
        }
    }

    err
}

/// One mkdir attempt per segment, root to leaf; existing directories are fine
fn create_dir_all(channel: &dyn RemoteChannel, target: &str) -> Result<usize> {
    let mut created = 0;
    for segment in paths::ancestors_inclusive(target) {
        match channel.mkdir(&segment, DIR_MODE) {
            Ok(()) => created += 1,
            Err(e) if e.is_transport_fault() => return Err(e),
            Err(e) => match channel.stat(&segment) {
                Ok(attrs) if attrs.is_dir() => {}
                Ok(_) => {
                    return Err(Error::AlreadyExists(format!(
                        "{segment} exists and is not a directory"
                    )));
                }
                Err(_) => return Err(e),
            },
        }
    }
    Ok(created)
}

/// Pre-order search in listing order
fn search(
    channel: &dyn RemoteChannel,
    base: &str,
    needle: &str,
    recursive: bool,
) -> Result<Vec<FileEntry>> {
    let mut matches = Vec::new();
    let mut stack = vec![list_dir(channel, base)?.into_iter()];

    while let Some(frame) = stack.last_mut() {
        let Some(entry) = frame.next() else {
            stack.pop();
            continue;
        };

        let descend = recursive && entry.is_directory;
        let child = descend.then(|| entry.path.clone());
        if entry.name.to_lowercase().contains(needle) {
            matches.push(entry);
        }
        if let Some(child) = child {
            stack.push(list_dir(channel, &child)?.into_iter());
        }
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FileAttrs;

    fn entry(name: &str, is_directory: bool) -> FileEntry {
        let attrs = if is_directory {
            FileAttrs::directory(0o755)
        } else {
            FileAttrs::file(10, 0o644)
        };
        attrs.to_entry(name, &paths::join("/", name))
    }

    #[test]
    fn test_sort_entries_directories_first() {
        let mut entries = vec![
            entry("readme.txt", false),
            entry("logs", true),
            entry("Archive", true),
            entry("b.txt", false),
            entry("A.txt", false),
        ];
        sort_entries(&mut entries);

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Archive", "logs", "A.txt", "b.txt", "readme.txt"]);
    }

    #[test]
    fn test_upload_options_builders() {
        let options = UploadOptions::verified().with_overwrite(false);
        assert!(options.verify);
        assert_eq!(options.overwrite, Some(false));
        assert!(options.progress.is_none());
        assert!(format!("{options:?}").contains("progress: false"));
    }

    #[test]
    fn test_executor_options_follow_config() {
        let config = ClientConfig {
            overwrite_uploads: false,
            transfer_chunk_size: 1024,
            ..ClientConfig::default()
        };
        let options = ExecutorOptions::from_config(&config);
        assert!(!options.overwrite_uploads);
        assert_eq!(options.transfer_chunk_size, 1024);
        assert!(!options.overwrite_on_rename);
    }
}
