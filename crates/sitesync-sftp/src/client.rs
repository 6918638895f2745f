//! Wiring of the transfer engine from a [`ClientConfig`]

use sitesync_core::{CredentialProvider, Error, Result, SiteDirectory, TransactionRecorder};
use std::sync::Arc;
use tracing::info;

use crate::audit::{CompositeRecorder, JsonLinesRecorder, TracingRecorder};
use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::credentials::EnvCredentialProvider;
use crate::executor::{ExecutorOptions, FileOperationExecutor};
use crate::host_key::HostKeyVerifier;
use crate::metrics::Metrics;
use crate::sites::StaticSiteDirectory;
use crate::ssh::Ssh2Connector;
use crate::transport::Connector;

/// Assembles a [`FileOperationExecutor`]
///
/// Anything not supplied falls back to the configuration: sites from
/// `config.sites`, `env:`/`plain:` secret references, libssh2 transport and
/// a tracing recorder plus the JSON-lines audit file when one is set.
pub struct ClientBuilder {
    config: ClientConfig,
    sites: Option<Arc<dyn SiteDirectory>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    connector: Option<Arc<dyn Connector>>,
    recorder: Option<Arc<dyn TransactionRecorder>>,
    metrics: Option<Metrics>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            sites: None,
            credentials: None,
            connector: None,
            recorder: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn sites(mut self, sites: Arc<dyn SiteDirectory>) -> Self {
        self.sites = Some(sites);
        self
    }

    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    #[must_use]
    pub fn recorder(mut self, recorder: Arc<dyn TransactionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    #[must_use]
    pub fn metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and build the executor
    pub fn build(self) -> Result<FileOperationExecutor> {
        let config = self.config;
        config.validate()?;

        let host_keys = match &config.known_hosts_file {
            Some(path) => HostKeyVerifier::load(path)?,
            None => HostKeyVerifier::in_memory(),
        };

        let recorder = match self.recorder {
            Some(recorder) => recorder,
            None => default_recorder(&config)?,
        };

        let sites = self
            .sites
            .unwrap_or_else(|| Arc::new(StaticSiteDirectory::new(config.sites.clone())));
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(EnvCredentialProvider));
        let connector = self
            .connector
            .unwrap_or_else(|| {
                Arc::new(Ssh2Connector::new(
                    config.keepalive_interval_secs,
                    config.operation_timeout(),
                ))
            });

        let connections = ConnectionManager::new(
            sites,
            credentials,
            connector,
            Arc::new(host_keys),
            config.connect_timeout(),
        )
        .with_metrics(self.metrics.unwrap_or_default());

        info!(
            sites = config.sites.len(),
            connect_timeout_secs = config.connect_timeout_secs,
            overwrite_uploads = config.overwrite_uploads,
            "Transfer client ready"
        );

        Ok(FileOperationExecutor::new(
            Arc::new(connections),
            recorder,
            ExecutorOptions::from_config(&config),
        ))
    }
}

fn default_recorder(config: &ClientConfig) -> Result<Arc<dyn TransactionRecorder>> {
    let Some(path) = &config.audit_file else {
        return Ok(Arc::new(TracingRecorder));
    };

    let file = JsonLinesRecorder::open(path).map_err(|e| {
        Error::Config(format!("Failed to open audit file {}: {e}", path.display()))
    })?;

    Ok(Arc::new(
        CompositeRecorder::new()
            .with(Arc::new(TracingRecorder))
            .with(Arc::new(file)),
    ))
}
