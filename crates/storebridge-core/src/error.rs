//! Bridge error taxonomy.

use storebridge_cdp::CdpError;
use thiserror::Error;

use crate::cache::VersionCacheError;
use crate::registry::Generation;

/// Errors surfaced by the bridging layer.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// A canonical facade key could not be bound; no facade was produced.
    #[error("Module resolution failed for facade key '{key}'")]
    ModuleResolution { key: String },

    /// The module registry of the detected generation is not present in the page.
    #[error("{generation} module registry is not available in the page")]
    RegistryUnavailable { generation: Generation },

    /// A strict version cache could not provide the requested snapshot.
    #[error("Version {version} could not be resolved: {reason}")]
    VersionResolve { version: String, reason: String },

    /// The readiness budget ran out across all re-arm cycles.
    #[error("Target not ready within {budget_ms}ms ({rearms} context re-arms)")]
    InjectionTimeout { budget_ms: u64, rearms: u32 },

    /// The execution context was replaced during a direct facade call.
    #[error("Execution context destroyed: {0}")]
    ContextDestroyed(String),

    /// Version cache failure other than a strict miss.
    #[error("Version cache error: {0}")]
    Cache(VersionCacheError),

    /// Browser-control failure.
    #[error("Browser error: {0}")]
    Cdp(CdpError),

    /// Configuration rejected at startup.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A page value did not have the expected shape.
    #[error("Unexpected page value: {0}")]
    UnexpectedValue(String),
}

impl BridgeError {
    pub fn is_context_destroyed(&self) -> bool {
        matches!(self, BridgeError::ContextDestroyed(_))
    }
}

impl From<CdpError> for BridgeError {
    fn from(e: CdpError) -> Self {
        match e {
            CdpError::ContextDestroyed(msg) => BridgeError::ContextDestroyed(msg),
            other => BridgeError::Cdp(other),
        }
    }
}

impl From<VersionCacheError> for BridgeError {
    fn from(e: VersionCacheError) -> Self {
        match e {
            VersionCacheError::Resolve { version, reason } => {
                BridgeError::VersionResolve { version, reason }
            }
            other => BridgeError::Cache(other),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::UnexpectedValue(e.to_string())
    }
}
