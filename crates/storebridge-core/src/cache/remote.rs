//! Remote archive cache behind a `{version}` URL template.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{VersionCache, VersionCacheError};

const PLACEHOLDER: &str = "{version}";

/// Read-only cache backed by an externally managed archive.
#[derive(Debug, Clone)]
pub struct RemoteCache {
    template: String,
    strict: bool,
    client: reqwest::Client,
}

impl RemoteCache {
    pub fn new(template: impl Into<String>, strict: bool) -> Result<Self, VersionCacheError> {
        let template = template.into();
        if !template.contains(PLACEHOLDER) {
            return Err(VersionCacheError::Misconfigured(format!(
                "remote_path '{}' has no {} placeholder",
                template, PLACEHOLDER
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            template,
            strict,
            client,
        })
    }

    /// URL for `version`.
    pub fn url_for(&self, version: &str) -> String {
        self.template.replace(PLACEHOLDER, version)
    }

    fn miss(&self, version: &str, reason: String) -> Result<Option<String>, VersionCacheError> {
        if self.strict {
            Err(VersionCacheError::Resolve {
                version: version.to_string(),
                reason,
            })
        } else {
            warn!("remote cache miss for {}: {}", version, reason);
            Ok(None)
        }
    }
}

#[async_trait]
impl VersionCache for RemoteCache {
    fn kind(&self) -> &'static str {
        "remote"
    }

    async fn resolve(&self, version: &str) -> Result<Option<String>, VersionCacheError> {
        let url = self.url_for(version);
        debug!("fetching snapshot {} from {}", version, url);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return self.miss(version, e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return self.miss(version, format!("HTTP {}", status.as_u16()));
        }

        match response.text().await {
            Ok(body) => Ok(Some(body)),
            Err(e) => self.miss(version, e.to_string()),
        }
    }

    async fn persist(&self, _content: &str, version: &str) -> Result<(), VersionCacheError> {
        debug!("remote archive is externally managed; not persisting {}", version);
        Ok(())
    }
}
