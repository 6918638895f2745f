//! Client-side transfer metrics
//!
//! Counters are plain atomics behind an `Arc`, so a `Metrics` handle can be
//! cloned into every component that records against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitesync_core::{ActionType, Error};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

/// Process-wide transfer metrics
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    // Session metrics
    sessions_opened: AtomicU64,
    sessions_closed: AtomicU64,
    active_sessions: AtomicUsize,
    session_failures: AtomicU64,
    auth_failures: AtomicU64,

    // Operation metrics
    operations: AtomicU64,
    operation_failures: AtomicU64,

    // Data transfer metrics
    bytes_uploaded: AtomicU64,
    bytes_downloaded: AtomicU64,
    verified_uploads: AtomicU64,
    integrity_mismatches: AtomicU64,

    // Failure kinds
    not_found: AtomicU64,
    permission_denied: AtomicU64,
    already_exists: AtomicU64,
    transport_errors: AtomicU64,
    other_errors: AtomicU64,

    start_time: DateTime<Utc>,
}

/// Snapshot of current metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: i64,

    // Session metrics
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub active_sessions: usize,
    pub session_failures: u64,
    pub auth_failures: u64,

    // Operation metrics
    pub operations: u64,
    pub operation_failures: u64,
    pub success_rate: f64,

    // Data transfer metrics
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
    pub total_bytes: u64,
    pub verified_uploads: u64,
    pub integrity_mismatches: u64,

    // Failure kinds
    pub not_found: u64,
    pub permission_denied: u64,
    pub already_exists: u64,
    pub transport_errors: u64,
    pub other_errors: u64,
}

/// Wall-clock timer for one operation
#[derive(Debug)]
pub struct OperationTimer {
    start: Instant,
    action: ActionType,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                sessions_opened: AtomicU64::new(0),
                sessions_closed: AtomicU64::new(0),
                active_sessions: AtomicUsize::new(0),
                session_failures: AtomicU64::new(0),
                auth_failures: AtomicU64::new(0),
                operations: AtomicU64::new(0),
                operation_failures: AtomicU64::new(0),
                bytes_uploaded: AtomicU64::new(0),
                bytes_downloaded: AtomicU64::new(0),
                verified_uploads: AtomicU64::new(0),
                integrity_mismatches: AtomicU64::new(0),
                not_found: AtomicU64::new(0),
                permission_denied: AtomicU64::new(0),
                already_exists: AtomicU64::new(0),
                transport_errors: AtomicU64::new(0),
                other_errors: AtomicU64::new(0),
                start_time: Utc::now(),
            }),
        }
    }

    // Session metrics

    /// Record a newly established session
    pub fn record_session_opened(&self) {
        self.inner.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.inner.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session leaving the cache
    pub fn record_session_closed(&self) {
        self.inner.sessions_closed.fetch_add(1, Ordering::Relaxed);
        let _ = self.inner.active_sessions.fetch_update(
            Ordering::Relaxed,
            Ordering::Relaxed,
            |n| n.checked_sub(1),
        );
    }

    /// Record a failed attempt to establish a session
    pub fn record_session_failure(&self, err: &Error) {
        self.inner.session_failures.fetch_add(1, Ordering::Relaxed);
        if matches!(err, Error::AuthenticationFailure(_)) {
            self.inner.auth_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Operation metrics

    /// Record a completed operation
    pub fn record_operation(&self, outcome: Result<(), &Error>) {
        self.inner.operations.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = outcome {
            self.inner.operation_failures.fetch_add(1, Ordering::Relaxed);
            self.record_error(err);
        }
    }

    fn record_error(&self, err: &Error) {
        let counter = match err {
            Error::NotFound(_) => &self.inner.not_found,
            Error::PermissionDenied(_) => &self.inner.permission_denied,
            Error::AlreadyExists(_) => &self.inner.already_exists,
            Error::HostUnreachable(_) | Error::Timeout(_) => &self.inner.transport_errors,
            Error::IntegrityMismatch { .. } => &self.inner.integrity_mismatches,
            _ => &self.inner.other_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record bytes written by an upload
    pub fn record_upload(&self, bytes: u64, verified: bool) {
        self.inner.bytes_uploaded.fetch_add(bytes, Ordering::Relaxed);
        if verified {
            self.inner.verified_uploads.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record bytes read by a download
    pub fn record_download(&self, bytes: u64) {
        self.inner.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Start timing an operation
    pub fn start_timer(&self, action: ActionType) -> OperationTimer {
        OperationTimer {
            start: Instant::now(),
            action,
        }
    }

    /// Get a snapshot of current metrics
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = Utc::now();
        let uptime = now.signed_duration_since(self.inner.start_time);

        let operations = self.inner.operations.load(Ordering::Relaxed);
        let operation_failures = self.inner.operation_failures.load(Ordering::Relaxed);
        let success_rate = if operations > 0 {
            ((operations - operation_failures) as f64 / operations as f64) * 100.0
        } else {
            0.0
        };

        let bytes_uploaded = self.inner.bytes_uploaded.load(Ordering::Relaxed);
        let bytes_downloaded = self.inner.bytes_downloaded.load(Ordering::Relaxed);

        MetricsSnapshot {
            timestamp: now,
            uptime_seconds: uptime.num_seconds(),
            sessions_opened: self.inner.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.inner.sessions_closed.load(Ordering::Relaxed),
            active_sessions: self.inner.active_sessions.load(Ordering::Relaxed),
            session_failures: self.inner.session_failures.load(Ordering::Relaxed),
            auth_failures: self.inner.auth_failures.load(Ordering::Relaxed),
            operations,
            operation_failures,
            success_rate,
            bytes_uploaded,
            bytes_downloaded,
            total_bytes: bytes_uploaded + bytes_downloaded,
            verified_uploads: self.inner.verified_uploads.load(Ordering::Relaxed),
            integrity_mismatches: self.inner.integrity_mismatches.load(Ordering::Relaxed),
            not_found: self.inner.not_found.load(Ordering::Relaxed),
            permission_denied: self.inner.permission_denied.load(Ordering::Relaxed),
            already_exists: self.inner.already_exists.load(Ordering::Relaxed),
            transport_errors: self.inner.transport_errors.load(Ordering::Relaxed),
            other_errors: self.inner.other_errors.load(Ordering::Relaxed),
        }
    }

    /// Export metrics as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.snapshot())
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationTimer {
    /// Elapsed time in whole milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn action(&self) -> ActionType {
        self.action
    }
}

impl MetricsSnapshot {
    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Transfer Metrics (uptime: {}s)\n\
             Sessions: {} opened, {} closed, {} active, {} failed ({} auth)\n\
             Operations: {} total, {} failed ({:.1}% success rate)\n\
             Data: {} bytes uploaded, {} bytes downloaded ({} total)\n\
             Integrity: {} verified uploads, {} mismatches\n\
             Errors: {} not_found, {} permission, {} exists, {} transport, {} other",
            self.uptime_seconds,
            self.sessions_opened, self.sessions_closed, self.active_sessions,
            self.session_failures, self.auth_failures,
            self.operations, self.operation_failures, self.success_rate,
            self.bytes_uploaded, self.bytes_downloaded, self.total_bytes,
            self.verified_uploads, self.integrity_mismatches,
            self.not_found, self.permission_denied, self.already_exists,
            self.transport_errors, self.other_errors
        )
    }
}
