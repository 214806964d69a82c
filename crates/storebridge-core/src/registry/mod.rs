//! Module discovery across the target's two loader generations.
//!
//! A [`ModuleDescriptor`] names one internal module: either a [`Predicate`]
//! over its exports (legacy indexed registry, first match wins) or a stable
//! string identifier (modern lookup primitive), plus the export path the
//! facade binds. Both generations implement [`ModuleRegistry`], so the store
//! builder never branches on generation itself.

mod legacy;
mod modern;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use storebridge_config::GenerationSetting;
use tracing::debug;

use crate::error::BridgeError;
use crate::page::PageContext;
use crate::version::WebVersion;

pub use legacy::LegacyRegistry;
pub use modern::ModernRegistry;

/// Module loader generation of the target application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generation {
    /// One large indexed registry scanned by predicate.
    Legacy,
    /// Modules fetched by stable string identifier.
    Modern,
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generation::Legacy => write!(f, "legacy"),
            Generation::Modern => write!(f, "modern"),
        }
    }
}

/// Structural test over a module's exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// The module has a top-level export with this name.
    HasExport(&'static str),
    /// The module's `default` export has a member with this name.
    DefaultHas(&'static str),
    /// Every listed predicate holds.
    All(&'static [Predicate]),
}

impl Predicate {
    /// Evaluate against a described module.
    pub fn matches(&self, module: &ModuleRef) -> bool {
        match self {
            Predicate::HasExport(name) => module.exports.contains_key(*name),
            Predicate::DefaultHas(name) => module.default_exports.contains_key(*name),
            Predicate::All(all) => all.iter().all(|p| p.matches(module)),
        }
    }

    /// JavaScript boolean expression over a module bound to `m`.
    pub fn to_js(&self) -> String {
        match self {
            Predicate::HasExport(name) => format!("(m[{}] !== undefined)", js_str(name)),
            Predicate::DefaultHas(name) => format!(
                "(m.default != null && m.default[{}] !== undefined)",
                js_str(name)
            ),
            Predicate::All(all) => {
                let parts: Vec<String> = all.iter().map(Predicate::to_js).collect();
                format!("({})", parts.join(" && "))
            }
        }
    }
}

/// How a module is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Scan the registry; the first module satisfying the predicate wins.
    Match(Predicate),
    /// Fetch by stable identifier.
    Id(&'static str),
}

/// Which part of a located module the facade binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPath {
    /// The whole exports object.
    Module,
    /// `exports[name]`.
    Named(&'static str),
    /// `exports.default`.
    Default,
    /// `exports.default[name]`.
    DefaultNamed(&'static str),
}

impl ExportPath {
    /// Whether the located module actually carries this export.
    pub fn present_in(&self, module: &ModuleRef) -> bool {
        match self {
            ExportPath::Module => true,
            ExportPath::Named(name) => module.exports.contains_key(*name),
            ExportPath::Default => module.exports.contains_key("default"),
            ExportPath::DefaultNamed(name) => module.default_exports.contains_key(*name),
        }
    }

    /// Property access suffix appended to a module accessor.
    pub fn js_suffix(&self) -> String {
        match self {
            ExportPath::Module => String::new(),
            ExportPath::Named(name) => format!("[{}]", js_str(name)),
            ExportPath::Default => ".default".to_string(),
            ExportPath::DefaultNamed(name) => format!(".default[{}]", js_str(name)),
        }
    }
}

/// Identifies one internal module and the export to bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub selector: Selector,
    pub export: ExportPath,
}

impl ModuleDescriptor {
    pub const fn new(selector: Selector, export: ExportPath) -> Self {
        Self { selector, export }
    }

    /// Modern module bound whole.
    pub const fn id(id: &'static str) -> Self {
        Self::new(Selector::Id(id), ExportPath::Module)
    }

    /// Legacy module found by a top-level export and bound whole.
    pub const fn exporting(name: &'static str) -> Self {
        Self::new(Selector::Match(Predicate::HasExport(name)), ExportPath::Module)
    }
}

/// Kind of an exported value, from JavaScript `typeof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Object,
    #[serde(other)]
    Other,
}

/// A located module: registry identifier plus its export shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRef {
    pub id: String,
    #[serde(default)]
    pub exports: BTreeMap<String, ExportKind>,
    #[serde(default)]
    pub default_exports: BTreeMap<String, ExportKind>,
}

/// A module registry generation.
#[async_trait]
pub trait ModuleRegistry: Send + Sync {
    fn generation(&self) -> Generation;

    /// Expression that is truthy once this registry can be queried.
    fn ready_expression(&self) -> &'static str;

    /// Make the registry queryable in the current context.
    async fn prepare(&self, page: &dyn PageContext) -> Result<(), BridgeError>;

    /// Locate the module a selector names.
    async fn locate(
        &self,
        page: &dyn PageContext,
        selector: &Selector,
    ) -> Result<Option<ModuleRef>, BridgeError>;

    /// JavaScript expression evaluating to a located module's exports.
    fn accessor(&self, module: &ModuleRef) -> String;
}

/// Shared in-page helper describing a module's export shape.
pub(crate) const DESCRIBE_JS: &str = r#"const describe = (id, m) => {
    const kinds = (o) => {
        const out = {};
        if (o !== null && (typeof o === 'object' || typeof o === 'function')) {
            for (const k of Object.keys(o)) {
                try { out[k] = typeof o[k]; } catch (e) { out[k] = 'undefined'; }
            }
        }
        return out;
    };
    return { id: String(id), exports: kinds(m), default_exports: kinds(m && m.default) };
};"#;

/// Quote a string as a JavaScript literal.
pub(crate) fn js_str(s: &str) -> String {
    json!(s).to_string()
}

/// Registries for both generations.
#[derive(Clone)]
pub struct Registries {
    pub legacy: std::sync::Arc<dyn ModuleRegistry>,
    pub modern: std::sync::Arc<dyn ModuleRegistry>,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            legacy: std::sync::Arc::new(LegacyRegistry),
            modern: std::sync::Arc::new(ModernRegistry),
        }
    }
}

impl Registries {
    pub fn for_generation(&self, generation: Generation) -> &dyn ModuleRegistry {
        match generation {
            Generation::Legacy => self.legacy.as_ref(),
            Generation::Modern => self.modern.as_ref(),
        }
    }

    /// Readiness expression for a generation setting; `Auto` accepts either.
    pub fn ready_expression(&self, setting: GenerationSetting) -> String {
        match setting {
            GenerationSetting::Legacy => self.legacy.ready_expression().to_string(),
            GenerationSetting::Modern => self.modern.ready_expression().to_string(),
            GenerationSetting::Auto => format!(
                "({}) || ({})",
                self.modern.ready_expression(),
                self.legacy.ready_expression()
            ),
        }
    }
}

/// Result of inspecting the page for its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    pub generation: Generation,
    pub version: Option<String>,
}

const DETECT_JS: &str = r#"(() => ({
    version: (window.Debug && window.Debug.VERSION) ? String(window.Debug.VERSION) : null,
    lookup: typeof window.require === 'function' && typeof window.__d === 'function'
}))()"#;

/// Determine which registry generation the page uses.
///
/// A forced setting wins. Otherwise the page is modern when it exposes the
/// string-keyed lookup primitive or reports a version at or above the
/// modern floor.
pub async fn detect(
    page: &dyn PageContext,
    setting: GenerationSetting,
) -> Result<Detected, BridgeError> {
    let value = page.evaluate(DETECT_JS).await?;
    let version = value["version"].as_str().map(str::to_string);
    let has_lookup = value["lookup"].as_bool().unwrap_or(false);

    let generation = match setting {
        GenerationSetting::Legacy => Generation::Legacy,
        GenerationSetting::Modern => Generation::Modern,
        GenerationSetting::Auto => {
            let modern_version = version
                .as_deref()
                .and_then(|v| v.parse::<WebVersion>().ok())
                .map(|v| v.has_modern_registry())
                .unwrap_or(false);
            if has_lookup || modern_version {
                Generation::Modern
            } else {
                Generation::Legacy
            }
        }
    };

    debug!(
        "detected {} registry (version {:?}, lookup primitive: {})",
        generation, version, has_lookup
    );
    Ok(Detected {
        generation,
        version,
    })
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
