//! Bundle snapshot caches.
//!
//! A [`VersionCache`] resolves the raw bundle text for a version string and
//! optionally persists freshly captured snapshots. Three strategies exist:
//!
//! - [`NoneCache`]: never pins anything
//! - [`LocalCache`]: one `{dir}/{version}.html` file per version
//! - [`RemoteCache`]: an externally managed archive behind a URL template
//!
//! In strict mode a miss is a [`VersionCacheError::Resolve`]; in lenient mode
//! it is `Ok(None)` and the caller falls back to live content. Nothing is
//! retried here.

mod local;
mod none;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use storebridge_config::{CacheKind, VersionCacheConfig};
use thiserror::Error;

pub use local::LocalCache;
pub use none::NoneCache;
pub use remote::RemoteCache;

/// Version cache errors.
#[derive(Debug, Clone, Error)]
pub enum VersionCacheError {
    /// Strict-mode miss.
    #[error("Version {version} could not be resolved: {reason}")]
    Resolve { version: String, reason: String },

    #[error("Invalid version key: {0}")]
    InvalidVersion(String),

    #[error("Invalid cache configuration: {0}")]
    Misconfigured(String),

    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),
}

impl From<std::io::Error> for VersionCacheError {
    fn from(e: std::io::Error) -> Self {
        VersionCacheError::Io(Arc::new(e))
    }
}

impl From<reqwest::Error> for VersionCacheError {
    fn from(e: reqwest::Error) -> Self {
        VersionCacheError::Http(Arc::new(e))
    }
}

/// A snapshot resolved from a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCacheEntry {
    pub version: String,
    pub content: Option<String>,
}

/// Strategy for resolving and persisting bundle snapshots.
#[async_trait]
pub trait VersionCache: Send + Sync {
    /// Short strategy name for logs.
    fn kind(&self) -> &'static str;

    /// Raw bundle text for `version`, or `None` on a lenient miss.
    async fn resolve(&self, version: &str) -> Result<Option<String>, VersionCacheError>;

    /// Store `content` as the snapshot of `version`.
    async fn persist(&self, content: &str, version: &str) -> Result<(), VersionCacheError>;

    /// Resolve into an entry.
    async fn entry(&self, version: &str) -> Result<VersionCacheEntry, VersionCacheError> {
        Ok(VersionCacheEntry {
            version: version.to_string(),
            content: self.resolve(version).await?,
        })
    }
}

/// Build the configured cache strategy.
pub fn from_config(config: &VersionCacheConfig) -> Result<Box<dyn VersionCache>, VersionCacheError> {
    match config.kind {
        CacheKind::None => Ok(Box::new(NoneCache)),
        CacheKind::Local => Ok(Box::new(LocalCache::new(config.local_dir(), config.strict))),
        CacheKind::Remote => {
            let template = config.remote_path.clone().ok_or_else(|| {
                VersionCacheError::Misconfigured("remote cache requires remote_path".to_string())
            })?;
            Ok(Box::new(RemoteCache::new(template, config.strict)?))
        }
    }
}
