//! Serving a cached bundle snapshot in place of the live document.

use storebridge_config::VersionCacheConfig;
use tracing::{debug, info, warn};

use crate::cache::{self, VersionCache};
use crate::error::BridgeError;
use crate::page::PageContext;

/// What the page will load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinOutcome {
    /// The cached snapshot of this version is served.
    Pinned(String),
    /// The live document is loaded.
    Live,
}

/// Pins the target to a cached version when one is configured and available.
pub struct VersionPin {
    cache: Box<dyn VersionCache>,
    version: Option<String>,
}

impl VersionPin {
    pub fn new(cache: Box<dyn VersionCache>, version: Option<String>) -> Self {
        Self { cache, version }
    }

    pub fn from_config(config: &VersionCacheConfig) -> Result<Self, BridgeError> {
        Ok(Self::new(cache::from_config(config)?, config.version.clone()))
    }

    pub fn cache(&self) -> &dyn VersionCache {
        self.cache.as_ref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Arrange for `web_url` to be served from the cache before navigation.
    ///
    /// A strict cache miss is an error; a lenient miss loads the live page.
    pub async fn prepare(
        &self,
        page: &dyn PageContext,
        web_url: &str,
    ) -> Result<PinOutcome, BridgeError> {
        let Some(version) = &self.version else {
            debug!("no version pinned, loading live content");
            return Ok(PinOutcome::Live);
        };

        match self.cache.resolve(version).await? {
            Some(content) => {
                info!(
                    "pinning {} to version {} ({} bytes from {} cache)",
                    web_url,
                    version,
                    content.len(),
                    self.cache.kind()
                );
                page.serve_document(web_url, content).await?;
                Ok(PinOutcome::Pinned(version.clone()))
            }
            None => {
                warn!("version {} unavailable, loading live content", version);
                Ok(PinOutcome::Live)
            }
        }
    }

    /// Persist the live document as the snapshot of `version`.
    ///
    /// Nothing is captured when the page was served from the cache or the
    /// version is unknown.
    pub async fn capture(
        &self,
        page: &dyn PageContext,
        outcome: &PinOutcome,
        version: Option<&str>,
    ) -> Result<(), BridgeError> {
        if let PinOutcome::Pinned(pinned) = outcome {
            debug!("page served from snapshot {}, skipping capture", pinned);
            return Ok(());
        }
        let Some(version) = version else {
            debug!("page reported no version, skipping capture");
            return Ok(());
        };

        let source = page.document_source().await?;
        self.cache.persist(&source, version).await?;
        debug!(
            "snapshot of {} ({} bytes) handed to {} cache",
            version,
            source.len(),
            self.cache.kind()
        );
        Ok(())
    }
}
