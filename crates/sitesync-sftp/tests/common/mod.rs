//! In-memory SFTP server for integration tests
//!
//! Implements the transport traits over a path-keyed map so every engine
//! code path runs without a network. Failure modes are switched on through
//! `ServerState`.

#![allow(dead_code)]

use sitesync_core::{
    Credential, Error, HostKeyPolicy, RecorderError, Result, SiteDescriptor, SiteId,
    TransactionRecord, TransactionRecorder,
};
use sitesync_sftp::protocol::{FileAttrs, S_IFLNK};
use sitesync_sftp::transport::{Connector, PendingSession, RawEntry, RemoteChannel, RemoteSession};
use sitesync_sftp::{ClientBuilder, ClientConfig, FileOperationExecutor, paths};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Fingerprint presented by the fake server
pub const HOST_KEY: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

pub const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
pub enum Node {
    Dir { mode: u32 },
    File { data: Vec<u8>, mode: u32 },
    Symlink { target: String },
}

impl Node {
    fn attrs(&self) -> FileAttrs {
        match self {
            Node::Dir { mode } => FileAttrs::directory(*mode),
            Node::File { data, mode } => FileAttrs {
                mtime: Some(1_700_000_000),
                atime: Some(1_700_000_100),
                uid: Some(1000),
                gid: Some(1000),
                ..FileAttrs::file(data.len() as u64, *mode)
            },
            Node::Symlink { .. } => FileAttrs {
                permissions: Some(S_IFLNK | 0o777),
                ..FileAttrs::default()
            },
        }
    }
}

#[derive(Debug)]
pub struct ServerState {
    pub nodes: BTreeMap<String, Node>,
    /// Every mkdir request in arrival order
    pub mkdir_calls: Vec<String>,
    /// Flip the first byte of every file read
    pub corrupt_reads: bool,
    pub unreachable: bool,
    pub password: String,
    pub host_key: String,
    /// Paths that answer every request with permission denied
    pub denied: HashSet<String>,
    /// Error returned by the next channel request
    pub fail_next_op: Option<Error>,
    pub handshakes: HashMap<SiteId, u64>,
    pub channels_opened: u64,
    pub disconnects: u64,
    pub handshake_delay: Duration,
    /// Bumped when the server drops every open connection
    pub epoch: u64,
    pub probes: u64,
}

impl Default for ServerState {
    fn default() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir { mode: 0o755 });
        Self {
            nodes,
            mkdir_calls: Vec::new(),
            corrupt_reads: false,
            unreachable: false,
            password: PASSWORD.to_string(),
            host_key: HOST_KEY.to_string(),
            denied: HashSet::new(),
            fail_next_op: None,
            handshakes: HashMap::new(),
            channels_opened: 0,
            disconnects: 0,
            handshake_delay: Duration::ZERO,
            epoch: 0,
            probes: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    /// Create a directory and any missing ancestors
    pub fn add_dir(&self, path: &str) {
        let mut state = self.state();
        for ancestor in paths::ancestors_inclusive(path) {
            state
                .nodes
                .entry(ancestor)
                .or_insert(Node::Dir { mode: 0o755 });
        }
    }

    /// Create a file, creating parent directories as needed
    pub fn add_file(&self, path: &str, data: &[u8]) {
        if let Some(parent) = paths::parent(path) {
            self.add_dir(parent);
        }
        self.state().nodes.insert(
            path.to_string(),
            Node::File {
                data: data.to_vec(),
                mode: 0o644,
            },
        );
    }

    pub fn add_symlink(&self, path: &str, target: &str) {
        self.state().nodes.insert(
            path.to_string(),
            Node::Symlink {
                target: target.to_string(),
            },
        );
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state().nodes.contains_key(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state().nodes.get(path) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn mode(&self, path: &str) -> Option<u32> {
        match self.state().nodes.get(path) {
            Some(Node::File { mode, .. } | Node::Dir { mode }) => Some(*mode),
            _ => None,
        }
    }

    /// Every path strictly below `prefix`
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        let base = format!("{}/", prefix.trim_end_matches('/'));
        self.state()
            .nodes
            .keys()
            .filter(|p| p.starts_with(&base))
            .cloned()
            .collect()
    }

    pub fn handshakes(&self, site_id: SiteId) -> u64 {
        self.state().handshakes.get(&site_id).copied().unwrap_or(0)
    }

    /// Drop every open connection without telling the clients
    pub fn drop_connections(&self) {
        self.state().epoch += 1;
    }

    pub fn probes(&self) -> u64 {
        self.state().probes
    }

    pub fn mkdir_calls(&self) -> Vec<String> {
        self.state().mkdir_calls.clone()
    }
}

impl Connector for FakeServer {
    fn handshake(
        &self,
        site: &SiteDescriptor,
        _timeout: Duration,
    ) -> Result<Box<dyn PendingSession>> {
        let delay = {
            let mut state = self.state();
            if state.unreachable {
                return Err(Error::HostUnreachable(format!(
                    "Connection refused by {}",
                    site.address()
                )));
            }
            *state.handshakes.entry(site.id).or_default() += 1;
            state.handshake_delay
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        Ok(Box::new(FakePending {
            server: self.clone(),
        }))
    }
}

struct FakePending {
    server: FakeServer,
}

impl PendingSession for FakePending {
    fn host_key_fingerprint(&self) -> Option<String> {
        Some(self.server.state().host_key.clone())
    }

    fn authenticate(
        self: Box<Self>,
        username: &str,
        credential: &Credential,
    ) -> Result<Arc<dyn RemoteSession>> {
        let accepted = match credential {
            Credential::Password(secret) => secret.expose() == self.server.state().password,
            Credential::PrivateKey { .. } => true,
        };
        if !accepted {
            return Err(Error::AuthenticationFailure(format!(
                "password authentication for {username} rejected"
            )));
        }

        let epoch = self.server.state().epoch;
        Ok(Arc::new(FakeSession {
            server: self.server,
            connected: Arc::new(AtomicBool::new(true)),
            epoch,
        }))
    }
}

struct FakeSession {
    server: FakeServer,
    connected: Arc<AtomicBool>,
    epoch: u64,
}

impl FakeSession {
    fn dropped_by_server(&self, state: &ServerState) -> bool {
        state.epoch != self.epoch
    }
}

impl RemoteSession for FakeSession {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn probe(&self) -> Result<()> {
        let mut state = self.server.state();
        state.probes += 1;
        if self.dropped_by_server(&state) {
            return Err(Error::HostUnreachable("connection reset by peer".into()));
        }
        Ok(())
    }

    fn open_channel(&self, _timeout: Duration) -> Result<Box<dyn RemoteChannel>> {
        if !self.is_connected() {
            return Err(Error::HostUnreachable("session closed".into()));
        }
        let mut state = self.server.state();
        if self.dropped_by_server(&state) {
            return Err(Error::HostUnreachable("connection reset by peer".into()));
        }
        state.channels_opened += 1;
        Ok(Box::new(FakeChannel {
            server: self.server.clone(),
            connected: Arc::clone(&self.connected),
        }))
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.server.state().disconnects += 1;
        }
    }
}

struct FakeChannel {
    server: FakeServer,
    connected: Arc<AtomicBool>,
}

impl FakeChannel {
    /// Injected failures and permission checks, then the locked state
    fn enter(&self, path: &str) -> Result<MutexGuard<'_, ServerState>> {
        let mut state = self.server.state();
        if let Some(err) = state.fail_next_op.take() {
            if err.is_transport_fault() {
                self.connected.store(false, Ordering::SeqCst);
            }
            return Err(err);
        }
        if state.denied.contains(path) {
            return Err(Error::PermissionDenied(path.to_string()));
        }
        Ok(state)
    }
}

fn resolve_link<'a>(state: &'a ServerState, path: &str) -> Option<&'a Node> {
    match state.nodes.get(path)? {
        Node::Symlink { target } => state.nodes.get(target),
        node => Some(node),
    }
}

fn missing(path: &str) -> Error {
    Error::NotFound(format!("{path}: no such file"))
}

fn failure(context: String) -> Error {
    Error::Unknown(format!("{context} (Failure)"))
}

impl RemoteChannel for FakeChannel {
    fn read_dir(&self, path: &str) -> Result<Vec<RawEntry>> {
        let state = self.enter(path)?;
        match resolve_link(&state, path) {
            Some(Node::Dir { .. }) => {}
            _ => return Err(missing(path)),
        }

        let mut entries = vec![
            RawEntry {
                name: ".".into(),
                attrs: FileAttrs::directory(0o755),
            },
            RawEntry {
                name: "..".into(),
                attrs: FileAttrs::directory(0o755),
            },
        ];
        for (child, node) in &state.nodes {
            if child != path && paths::parent(child) == Some(path) {
                entries.push(RawEntry {
                    name: paths::file_name(child).to_string(),
                    attrs: node.attrs(),
                });
            }
        }
        // Servers return entries in no particular order
        entries.reverse();
        Ok(entries)
    }

    fn stat(&self, path: &str) -> Result<FileAttrs> {
        let state = self.enter(path)?;
        resolve_link(&state, path)
            .map(Node::attrs)
            .ok_or_else(|| missing(path))
    }

    fn lstat(&self, path: &str) -> Result<FileAttrs> {
        let state = self.enter(path)?;
        state
            .nodes
            .get(path)
            .map(Node::attrs)
            .ok_or_else(|| missing(path))
    }

    fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        let mut state = self.enter(path)?;
        state.mkdir_calls.push(path.to_string());

        if state.nodes.contains_key(path) {
            return Err(failure(format!("mkdir {path}")));
        }
        match paths::parent(path).and_then(|p| state.nodes.get(p)) {
            Some(Node::Dir { .. }) => {}
            _ => return Err(missing(path)),
        }
        state.nodes.insert(path.to_string(), Node::Dir { mode });
        Ok(())
    }

    fn rmdir(&self, path: &str) -> Result<()> {
        let mut state = self.enter(path)?;
        match state.nodes.get(path) {
            Some(Node::Dir { .. }) => {}
            Some(_) => return Err(failure(format!("rmdir {path}"))),
            None => return Err(missing(path)),
        }
        let prefix = format!("{path}/");
        if state.nodes.keys().any(|p| p.starts_with(&prefix)) {
            return Err(failure(format!("rmdir {path}")));
        }
        state.nodes.remove(path);
        Ok(())
    }

    fn unlink(&self, path: &str) -> Result<()> {
        let mut state = self.enter(path)?;
        match state.nodes.get(path) {
            Some(Node::Dir { .. }) => Err(failure(format!("unlink {path}"))),
            Some(_) => {
                state.nodes.remove(path);
                Ok(())
            }
            None => Err(missing(path)),
        }
    }

    fn rename(&self, old_path: &str, new_path: &str, overwrite: bool) -> Result<()> {
        let mut state = self.enter(old_path)?;
        if !state.nodes.contains_key(old_path) {
            return Err(missing(old_path));
        }
        if state.nodes.contains_key(new_path) && !overwrite {
            return Err(Error::AlreadyExists(format!("{new_path} already exists")));
        }

        let prefix = format!("{old_path}/");
        let moved: Vec<String> = state
            .nodes
            .keys()
            .filter(|p| *p == old_path || p.starts_with(&prefix))
            .cloned()
            .collect();
        for from in moved {
            if let Some(node) = state.nodes.remove(&from) {
                let to = format!("{new_path}{}", &from[old_path.len()..]);
                state.nodes.insert(to, node);
            }
        }
        Ok(())
    }

    fn set_permissions(&self, path: &str, new_mode: u32) -> Result<()> {
        let mut state = self.enter(path)?;
        match state.nodes.get_mut(path) {
            Some(Node::File { mode, .. } | Node::Dir { mode }) => {
                *mode = new_mode;
                Ok(())
            }
            Some(Node::Symlink { .. }) => Ok(()),
            None => Err(missing(path)),
        }
    }

    fn write_file(
        &self,
        path: &str,
        data: &[u8],
        exclusive: bool,
        chunk_size: usize,
        on_progress: &mut dyn FnMut(u64),
    ) -> Result<()> {
        {
            let state = self.enter(path)?;
            match paths::parent(path).and_then(|p| state.nodes.get(p)) {
                Some(Node::Dir { .. }) => {}
                _ => return Err(missing(path)),
            }
            match state.nodes.get(path) {
                Some(_) if exclusive => {
                    return Err(Error::AlreadyExists(format!("{path} already exists")));
                }
                Some(Node::Dir { .. }) => return Err(failure(format!("open {path}"))),
                _ => {}
            }
        }

        let mut written = 0u64;
        for chunk in data.chunks(chunk_size.max(1)) {
            written += chunk.len() as u64;
            on_progress(written);
        }

        self.server.state().nodes.insert(
            path.to_string(),
            Node::File {
                data: data.to_vec(),
                mode: 0o644,
            },
        );
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let state = self.enter(path)?;
        match resolve_link(&state, path) {
            Some(Node::File { data, .. }) => {
                let mut data = data.clone();
                if state.corrupt_reads {
                    match data.first_mut() {
                        Some(byte) => *byte ^= 0xff,
                        None => data.push(0),
                    }
                }
                Ok(data)
            }
            Some(_) => Err(failure(format!("read {path}"))),
            None => Err(missing(path)),
        }
    }
}

/// Recorder that keeps every record in memory
#[derive(Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<TransactionRecord>>,
    pub fail: AtomicBool,
}

impl MemoryRecorder {
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn last(&self) -> TransactionRecord {
        self.records().last().cloned().expect("no transaction recorded")
    }
}

impl TransactionRecorder for MemoryRecorder {
    fn record(&self, record: &TransactionRecord) -> std::result::Result<(), RecorderError> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecorderError("audit store unavailable".into()));
        }
        Ok(())
    }
}

pub const SITE: SiteId = SiteId(5);

pub fn test_site(id: u64) -> SiteDescriptor {
    SiteDescriptor {
        id: SiteId(id),
        name: format!("site-{id}"),
        host: "fake.example.com".into(),
        port: 22,
        username: "deploy".into(),
        secret_ref: format!("plain:{PASSWORD}"),
        private_key: None,
        target_root: "/".into(),
        host_key_policy: HostKeyPolicy::TrustOnFirstUse,
        known_host_fingerprint: None,
    }
}

pub struct Harness {
    pub executor: FileOperationExecutor,
    pub server: FakeServer,
    pub recorder: Arc<MemoryRecorder>,
}

/// Executor over a fresh fake server with site 5 configured
pub fn harness() -> Harness {
    harness_with(ClientConfig::default(), vec![test_site(SITE.0)])
}

pub fn harness_with(mut config: ClientConfig, sites: Vec<SiteDescriptor>) -> Harness {
    config.sites = sites;
    let server = FakeServer::new();
    let recorder = Arc::new(MemoryRecorder::default());

    let executor = ClientBuilder::new(config)
        .connector(server.connector())
        .recorder(recorder.clone())
        .build()
        .expect("failed to build executor");

    Harness {
        executor,
        server,
        recorder,
    }
}
