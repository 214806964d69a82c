//! Cache strategy that never pins.

use async_trait::async_trait;

use super::{VersionCache, VersionCacheError};

/// Always resolves to `None`; persisting is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneCache;

#[async_trait]
impl VersionCache for NoneCache {
    fn kind(&self) -> &'static str {
        "none"
    }

    async fn resolve(&self, _version: &str) -> Result<Option<String>, VersionCacheError> {
        Ok(None)
    }

    async fn persist(&self, _content: &str, _version: &str) -> Result<(), VersionCacheError> {
        Ok(())
    }
}
