//! Session cache
//!
//! One authenticated session per site id, created on first use and reused
//! until it is closed or found disconnected; a cached session must answer a
//! keepalive before it is handed out again. Each site has its own slot
//! mutex; creating a session holds that mutex, so concurrent callers for an
//! uncached site wait for the first one instead of opening a second session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sitesync_core::{
    Credential, CredentialProvider, Error, Result, SiteDescriptor, SiteDirectory, SiteId,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::host_key::HostKeyVerifier;
use crate::metrics::Metrics;
use crate::transport::{Connector, RemoteSession};

/// Cheap, clonable reference to a cached session
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    site: Arc<SiteDescriptor>,
    session: Arc<dyn RemoteSession>,
    connected: Arc<AtomicBool>,
    created_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Process-unique id of the underlying session
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn site_id(&self) -> SiteId {
        self.site.id
    }

    /// Descriptor the session was opened with
    pub fn site(&self) -> &SiteDescriptor {
        &self.site
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// False once the cache dropped this session or the transport failed
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && self.session.is_connected()
    }

    /// Whether both handles refer to the same session
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        self.id == other.id
    }

    pub(crate) fn session(&self) -> &dyn RemoteSession {
        self.session.as_ref()
    }

    fn mark_disconnected(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("site_id", &self.site.id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Cached session for one site
#[derive(Debug)]
pub struct SessionEntry {
    pub handle: SessionHandle,
    pub last_used: DateTime<Utc>,
}

impl SessionEntry {
    pub fn connected(&self) -> bool {
        self.handle.is_connected()
    }
}

/// Operator view of one cached session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub site_id: SiteId,
    pub session_id: u64,
    pub address: String,
    pub connected: bool,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SessionSlot {
    entry: Option<SessionEntry>,
    /// Sessions ever created for this site
    connections: u64,
}

/// Creates, authenticates and caches sessions keyed by site id
pub struct ConnectionManager {
    sites: Arc<dyn SiteDirectory>,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn Connector>,
    host_keys: Arc<HostKeyVerifier>,
    connect_timeout: Duration,
    metrics: Metrics,
    slots: RwLock<HashMap<SiteId, Arc<Mutex<SessionSlot>>>>,
    next_session_id: AtomicU64,
}

impl ConnectionManager {
    pub fn new(
        sites: Arc<dyn SiteDirectory>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        host_keys: Arc<HostKeyVerifier>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            sites,
            credentials,
            connector,
            host_keys,
            connect_timeout,
            metrics: Metrics::new(),
            slots: RwLock::new(HashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Record session events against a shared metrics handle
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Bound used for connecting and for opening channels
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    async fn slot(&self, site_id: SiteId) -> Arc<Mutex<SessionSlot>> {
        if let Some(slot) = self.slots.read().await.get(&site_id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(site_id).or_default())
    }

    async fn existing_slot(&self, site_id: SiteId) -> Option<Arc<Mutex<SessionSlot>>> {
        self.slots.read().await.get(&site_id).map(Arc::clone)
    }

    /// Return the cached session for `site_id`, opening one if needed
    pub async fn get_or_create_session(&self, site_id: SiteId) -> Result<SessionHandle> {
        let slot = self.slot(site_id).await;
        let mut slot = slot.lock().await;

        if let Some(entry) = slot.entry.as_mut() {
            if entry.connected() && self.probe(&entry.handle).await {
                entry.last_used = Utc::now();
                debug!(site_id = %site_id, session_id = entry.handle.id, "Reusing cached session");
                return Ok(entry.handle.clone());
            }

            info!(
                site_id = %site_id,
                session_id = entry.handle.id,
                event = "session_stale",
                "Cached session is disconnected, reconnecting"
            );
            if let Some(stale) = slot.entry.take() {
                self.release(stale.handle).await;
            }
        }

        let site = self.sites.find(site_id).await?;
        let handle = match self.connect(site).await {
            Ok(handle) => handle,
            Err(e) => {
                self.metrics.record_session_failure(&e);
                warn!(
                    site_id = %site_id,
                    kind = %e.kind(),
                    error = %e,
                    event = "session_failed",
                    "Failed to establish session"
                );
                return Err(e);
            }
        };

        slot.connections += 1;
        slot.entry = Some(SessionEntry {
            handle: handle.clone(),
            last_used: Utc::now(),
        });
        self.metrics.record_session_opened();

        info!(
            site_id = %site_id,
            session_id = handle.id,
            address = %handle.site.address(),
            event = "session_opened",
            "Session established"
        );

        Ok(handle)
    }

    /// Keepalive round trip on a blocking worker; false once the peer is gone
    async fn probe(&self, handle: &SessionHandle) -> bool {
        let session = Arc::clone(&handle.session);
        let outcome = tokio::task::spawn_blocking(move || session.probe())
            .await
            .map_err(|e| Error::unknown(format!("Keepalive worker failed: {e}")))
            .and_then(|result| result);

        match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    site_id = %handle.site.id,
                    session_id = handle.id,
                    kind = %e.kind(),
                    error = %e,
                    event = "session_probe_failed",
                    "Cached session failed its keepalive"
                );
                handle.mark_disconnected();
                false
            }
        }
    }

    async fn connect(&self, site: SiteDescriptor) -> Result<SessionHandle> {
        let secret = self.credentials.decrypt(&site.secret_ref).map_err(|e| {
            Error::AuthenticationFailure(format!(
                "Failed to decrypt credential for site {}: {e}",
                site.id
            ))
        })?;
        let credential = Credential::for_site(&site, secret);

        let site = Arc::new(site);
        let connector = Arc::clone(&self.connector);
        let host_keys = Arc::clone(&self.host_keys);
        let timeout = self.connect_timeout;
        let descriptor = Arc::clone(&site);

        let session = tokio::task::spawn_blocking(move || {
            let pending = connector.handshake(&descriptor, timeout)?;
            let fingerprint = pending.host_key_fingerprint();
            host_keys.verify(&descriptor, fingerprint.as_deref())?;
            pending.authenticate(&descriptor.username, &credential)
        })
        .await
        .map_err(|e| Error::unknown(format!("Session worker failed: {e}")))??;

        Ok(SessionHandle {
            id: self.next_session_id.fetch_add(1, Ordering::Relaxed),
            site,
            session,
            connected: Arc::new(AtomicBool::new(true)),
            created_at: Utc::now(),
        })
    }

    /// Disconnect and drop the cached session for `site_id`
    ///
    /// Returns whether a session was cached. Closing an absent session is a
    /// no-op.
    pub async fn close_session(&self, site_id: SiteId) -> bool {
        let Some(slot) = self.existing_slot(site_id).await else {
            return false;
        };
        let entry = slot.lock().await.entry.take();

        match entry {
            Some(entry) => {
                info!(
                    site_id = %site_id,
                    session_id = entry.handle.id,
                    event = "session_closed",
                    "Session closed"
                );
                self.release(entry.handle).await;
                true
            }
            None => false,
        }
    }

    /// Disconnect and drop every cached session, returning how many closed
    pub async fn close_all(&self) -> usize {
        let slots: Vec<_> = self.slots.read().await.values().map(Arc::clone).collect();

        let mut closed = 0;
        for slot in slots {
            let entry = slot.lock().await.entry.take();
            if let Some(entry) = entry {
                self.release(entry.handle).await;
                closed += 1;
            }
        }

        info!(closed, event = "sessions_cleared", "Closed all cached sessions");
        closed
    }

    /// Drop the cached session if it is still the one behind `handle`
    ///
    /// Called after a transport fault; the next lookup opens a new session.
    pub async fn invalidate(&self, handle: &SessionHandle) {
        handle.mark_disconnected();

        let Some(slot) = self.existing_slot(handle.site_id()).await else {
            return;
        };
        let mut slot = slot.lock().await;
        let current = slot
            .entry
            .as_ref()
            .is_some_and(|entry| entry.handle.same_session(handle));

        if current && let Some(entry) = slot.entry.take() {
            drop(slot);
            warn!(
                site_id = %handle.site_id(),
                session_id = handle.id,
                event = "session_invalidated",
                "Dropping session after transport fault"
            );
            self.release(entry.handle).await;
        }
    }

    /// Number of sessions ever established for `site_id`
    pub async fn connection_count(&self, site_id: SiteId) -> u64 {
        match self.existing_slot(site_id).await {
            Some(slot) => slot.lock().await.connections,
            None => 0,
        }
    }

    /// Snapshot of every cached session
    pub async fn cached_sessions(&self) -> Vec<SessionInfo> {
        let slots: Vec<_> = self.slots.read().await.values().map(Arc::clone).collect();

        let mut sessions = Vec::new();
        for slot in slots {
            let slot = slot.lock().await;
            if let Some(entry) = &slot.entry {
                sessions.push(SessionInfo {
                    site_id: entry.handle.site_id(),
                    session_id: entry.handle.id,
                    address: entry.handle.site.address(),
                    connected: entry.connected(),
                    created_at: entry.handle.created_at,
                    last_used: entry.last_used,
                });
            }
        }
        sessions.sort_by_key(|s| s.site_id);
        sessions
    }

    async fn release(&self, handle: SessionHandle) {
        handle.mark_disconnected();
        self.metrics.record_session_closed();

        let site_id = handle.site_id();
        let result = tokio::task::spawn_blocking(move || handle.session.disconnect()).await;
        if let Err(e) = result {
            warn!(site_id = %site_id, error = %e, "Disconnect worker failed");
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}
