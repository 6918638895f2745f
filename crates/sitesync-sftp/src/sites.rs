//! Configuration-backed site directory

use async_trait::async_trait;
use sitesync_core::{Error, Result, SiteDescriptor, SiteDirectory, SiteId};
use std::collections::BTreeMap;

/// Serves a fixed set of sites, typically `ClientConfig::sites`
#[derive(Debug, Clone, Default)]
pub struct StaticSiteDirectory {
    sites: BTreeMap<SiteId, SiteDescriptor>,
}

impl StaticSiteDirectory {
    pub fn new(sites: impl IntoIterator<Item = SiteDescriptor>) -> Self {
        Self {
            sites: sites.into_iter().map(|site| (site.id, site)).collect(),
        }
    }

    /// All sites in id order
    pub fn sites(&self) -> impl Iterator<Item = &SiteDescriptor> {
        self.sites.values()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[async_trait]
impl SiteDirectory for StaticSiteDirectory {
    async fn find(&self, site_id: SiteId) -> Result<SiteDescriptor> {
        self.sites
            .get(&site_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("Site {site_id} is not configured")))
    }
}
