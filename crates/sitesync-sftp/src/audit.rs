//! Transaction recorders
//!
//! Every file operation produces one [`TransactionRecord`]. The recorders
//! here write them to the tracing pipeline, to a JSON-lines file, or to
//! several sinks at once.

use sitesync_core::{RecorderError, TransactionRecord, TransactionRecorder};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Emits each record as a structured audit event
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRecorder;

impl TransactionRecorder for TracingRecorder {
    fn record(&self, record: &TransactionRecord) -> Result<(), RecorderError> {
        if record.success {
            info!(
                event = "transaction",
                transaction_id = %record.id,
                site_id = %record.site_id,
                action = %record.action,
                path = %record.path,
                checksum = ?record.checksum,
                bytes = ?record.bytes,
                duration_ms = record.duration_ms,
                "{}",
                record.detail
            );
        } else {
            warn!(
                event = "transaction_failed",
                transaction_id = %record.id,
                site_id = %record.site_id,
                action = %record.action,
                path = %record.path,
                duration_ms = record.duration_ms,
                "{}",
                record.detail
            );
        }
        Ok(())
    }
}

/// Appends one JSON object per record to a file
#[derive(Debug)]
pub struct JsonLinesRecorder {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesRecorder {
    /// Open `path` for appending, creating it and its parent directories
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionRecorder for JsonLinesRecorder {
    fn record(&self, record: &TransactionRecord) -> Result<(), RecorderError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| RecorderError(format!("Failed to serialize record: {e}")))?;
        line.push('\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| RecorderError(format!("Failed to write {}: {e}", self.path.display())))
    }
}

/// Forwards each record to several recorders
///
/// Every recorder sees every record; the first error is reported after all
/// of them ran.
#[derive(Default, Clone)]
pub struct CompositeRecorder {
    recorders: Vec<Arc<dyn TransactionRecorder>>,
}

impl CompositeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, recorder: Arc<dyn TransactionRecorder>) -> Self {
        self.recorders.push(recorder);
        self
    }

    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }
}

impl TransactionRecorder for CompositeRecorder {
    fn record(&self, record: &TransactionRecord) -> Result<(), RecorderError> {
        let mut first_error = None;
        for recorder in &self.recorders {
            if let Err(e) = recorder.record(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
