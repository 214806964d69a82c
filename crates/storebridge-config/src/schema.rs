//! Configuration schema definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,

    #[serde(default)]
    pub version_cache: VersionCacheConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Browser attachment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Existing DevTools HTTP endpoint. When unset, one is derived from `debug_port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Launch a local Chrome when nothing answers on the endpoint.
    #[serde(default = "default_true")]
    pub launch: bool,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_debug_port")]
    pub debug_port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_dir: Option<String>,

    /// Explicit Chrome/Chromium binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// URL of the target application.
    #[serde(default = "default_web_url")]
    pub web_url: String,

    #[serde(default = "default_true")]
    pub bypass_csp: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            launch: true,
            headless: true,
            debug_port: default_debug_port(),
            profile_dir: None,
            executable: None,
            user_agent: None,
            web_url: default_web_url(),
            bypass_csp: true,
        }
    }
}

impl BrowserConfig {
    /// DevTools HTTP endpoint to connect to.
    pub fn endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.debug_port))
    }

    /// Profile directory, expanded; defaults to `~/.storebridge/profile`.
    pub fn profile_dir(&self) -> PathBuf {
        match &self.profile_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => storebridge_home().join("profile"),
        }
    }

    pub fn executable(&self) -> Option<PathBuf> {
        self.executable
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).to_string()))
    }
}

fn default_true() -> bool {
    true
}

fn default_debug_port() -> u16 {
    9333
}

fn default_web_url() -> String {
    "https://web.whatsapp.com/".to_string()
}

/// Which bundle snapshot store to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    None,
    Local,
    Remote,
}

/// Bundle version pinning configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionCacheConfig {
    #[serde(default)]
    pub kind: CacheKind,

    /// Directory for the local cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Endpoint template containing a literal `{version}` token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_path: Option<String>,

    /// Fail instead of falling back to live content when a snapshot is missing.
    #[serde(default)]
    pub strict: bool,

    /// Version to pin. Live content is served when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl VersionCacheConfig {
    /// Local cache directory, expanded; defaults to `~/.storebridge/cache`.
    pub fn local_dir(&self) -> PathBuf {
        match &self.path {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => storebridge_home().join("cache"),
        }
    }
}

/// Module registry generation selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSetting {
    #[default]
    Auto,
    Legacy,
    Modern,
}

/// Injection session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Overall readiness budget, shared across re-arm cycles.
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,

    #[serde(default)]
    pub generation: GenerationSetting,

    /// Replaces the generation's built-in readiness expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_expression: Option<String>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout(),
            generation: GenerationSetting::Auto,
            ready_expression: None,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_ready_timeout() -> u64 {
    30_000
}

fn default_poll_interval() -> u64 {
    100
}

/// Root directory for storebridge state (`~/.storebridge`).
pub fn storebridge_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".storebridge")
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
