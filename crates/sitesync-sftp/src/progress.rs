//! Upload progress reporting

use std::fmt;
use std::sync::Arc;

/// Receives `(bytes_transferred, total_bytes)` during an upload
///
/// Invoked from the blocking transfer worker, so implementations should
/// return quickly.
pub trait ProgressSink: Send + Sync {
    fn report(&self, bytes_transferred: u64, total_bytes: u64);
}

impl<F> ProgressSink for F
where
    F: Fn(u64, u64) + Send + Sync,
{
    fn report(&self, bytes_transferred: u64, total_bytes: u64) {
        self(bytes_transferred, total_bytes);
    }
}

/// Throttles a sink to at most one call per `interval` bytes
///
/// Forwarded values never decrease, and [`ThrottledProgress::finish`] always
/// delivers `(total, total)` exactly once.
pub struct ThrottledProgress {
    sink: Arc<dyn ProgressSink>,
    total: u64,
    interval: u64,
    last_reported: Option<u64>,
}

impl ThrottledProgress {
    pub fn new(sink: Arc<dyn ProgressSink>, total: u64, interval: u64) -> Self {
        Self {
            sink,
            total,
            interval: interval.max(1),
            last_reported: None,
        }
    }

    /// Note cumulative progress, forwarding it if the interval has elapsed
    pub fn update(&mut self, transferred: u64) {
        let transferred = transferred.min(self.total);
        if transferred >= self.total {
            // Reserved for finish()
            return;
        }

        let due = match self.last_reported {
            Some(last) => transferred >= last.saturating_add(self.interval),
            None => transferred >= self.interval,
        };
        if due {
            self.last_reported = Some(transferred);
            self.sink.report(transferred, self.total);
        }
    }

    /// Deliver the final `(total, total)` call
    pub fn finish(&mut self) {
        if self.last_reported != Some(self.total) {
            self.last_reported = Some(self.total);
            self.sink.report(self.total, self.total);
        }
    }
}

impl fmt::Debug for ThrottledProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottledProgress")
            .field("total", &self.total)
            .field("interval", &self.interval)
            .field("last_reported", &self.last_reported)
            .finish_non_exhaustive()
    }
}
