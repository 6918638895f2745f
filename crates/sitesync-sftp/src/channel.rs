//! Per-operation channel acquisition

use sitesync_core::{Error, Result};
use std::time::Duration;
use tracing::trace;

use crate::connection::SessionHandle;
use crate::transport::RemoteChannel;

/// Opens one file-transfer channel per operation over a cached session
///
/// Blocking; call from a `spawn_blocking` worker. The channel closes when
/// the returned box is dropped.
#[derive(Debug, Clone, Copy)]
pub struct ChannelFactory {
    connect_timeout: Duration,
}

impl ChannelFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// Open a channel, refusing sessions whose connected flag is down
    pub fn open(&self, handle: &SessionHandle) -> Result<Box<dyn RemoteChannel>> {
        if !handle.is_connected() {
            return Err(Error::HostUnreachable(format!(
                "Session {} for site {} is disconnected",
                handle.id(),
                handle.site_id()
            )));
        }

        let channel = handle.session().open_channel(self.connect_timeout)?;
        trace!(site_id = %handle.site_id(), session_id = handle.id(), "Channel opened");
        Ok(channel)
    }
}
