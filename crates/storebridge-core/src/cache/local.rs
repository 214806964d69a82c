//! File-backed cache: `{dir}/{version}.html`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{VersionCache, VersionCacheError};
use crate::version::WebVersion;

/// One raw bundle file per version, no metadata.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
    strict: bool,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>, strict: bool) -> Self {
        Self {
            dir: dir.into(),
            strict,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `version`.
    pub fn path_for(&self, version: &str) -> Result<PathBuf, VersionCacheError> {
        if !WebVersion::is_valid_key(version) {
            return Err(VersionCacheError::InvalidVersion(version.to_string()));
        }
        Ok(self.dir.join(format!("{}.html", version)))
    }

    /// Versions present in the cache directory.
    pub async fn versions(&self) -> Result<Vec<String>, VersionCacheError> {
        let mut versions = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(version) = name.strip_suffix(".html") {
                versions.push(version.to_string());
            }
        }
        versions.sort();
        Ok(versions)
    }

    fn miss(&self, version: &str, reason: String) -> Result<Option<String>, VersionCacheError> {
        if self.strict {
            Err(VersionCacheError::Resolve {
                version: version.to_string(),
                reason,
            })
        } else {
            warn!("local cache miss for {}: {}", version, reason);
            Ok(None)
        }
    }
}

#[async_trait]
impl VersionCache for LocalCache {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn resolve(&self, version: &str) -> Result<Option<String>, VersionCacheError> {
        let path = self.path_for(version)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                debug!("resolved {} from {}", version, path.display());
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.miss(version, format!("{} does not exist", path.display()))
            }
            Err(e) => self.miss(version, e.to_string()),
        }
    }

    async fn persist(&self, content: &str, version: &str) -> Result<(), VersionCacheError> {
        let path = self.path_for(version)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, content).await?;
        info!("persisted snapshot {} to {}", version, path.display());
        Ok(())
    }
}
