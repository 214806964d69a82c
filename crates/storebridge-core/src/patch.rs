//! Idempotent wrapping of bound facade functions.
//!
//! A patch replaces `owner[fn]` with a function calling
//! `wrapper(original, ...args)`. Records are tracked per facade instance, so
//! a patch is applied at most once per build and again on every fresh build.

use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::page::PageContext;
use crate::registry::js_str;
use crate::store::{FACADE_ROOT, StoreFacade};

/// Marker set on installed wrappers.
const PATCHED_MARKER: &str = "__storebridgePatched";

/// A wrapper to install on `key.function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchSpec {
    pub key: &'static str,
    pub function: &'static str,
    /// JavaScript `(original, ...args) => result`.
    pub wrapper: &'static str,
}

impl PatchSpec {
    pub fn target_key(&self) -> String {
        format!("{}.{}", self.key, self.function)
    }
}

/// Location payloads carry no binary media.
pub const LOCATION_MEDIA_TYPE: PatchSpec = PatchSpec {
    key: "MediaTypeInference",
    function: "mediaTypeFromProtobuf",
    wrapper: "(func, ...args) => { const [proto] = args; return proto && proto.locationMessage ? null : func(...args); }",
};

/// Location and group-invite payloads are text.
pub const LOCATION_TYPE_ATTRIBUTE: PatchSpec = PatchSpec {
    key: "ProtoTypeInference",
    function: "typeAttributeFromProtobuf",
    wrapper: "(func, ...args) => { const [proto] = args; return proto && (proto.locationMessage || proto.groupInviteMessage) ? 'text' : func(...args); }",
};

pub const BUILTIN_PATCHES: &[PatchSpec] = &[LOCATION_MEDIA_TYPE, LOCATION_TYPE_ATTRIBUTE];

/// Outcome of one patch on the current facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchRecord {
    pub target_key: String,
    pub applied: bool,
}

#[derive(Debug, Default)]
struct PatchTable {
    facade_instance: Option<u64>,
    records: BTreeMap<String, PatchRecord>,
}

/// Table of patches keyed by `Key.function`.
#[derive(Debug, Default)]
pub struct FunctionPatchRegistry {
    specs: Vec<PatchSpec>,
    table: Mutex<PatchTable>,
}

impl FunctionPatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in payload-inference fixes.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for spec in BUILTIN_PATCHES {
            registry.register(*spec);
        }
        registry
    }

    pub fn register(&mut self, spec: PatchSpec) {
        self.specs.push(spec);
    }

    pub fn specs(&self) -> &[PatchSpec] {
        &self.specs
    }

    /// Wrap `target_key` (`Key.function`) on `facade`.
    ///
    /// Returns whether the wrapper is in place. A second call for the same
    /// facade instance does not touch the page.
    pub async fn patch(
        &self,
        page: &dyn PageContext,
        facade: &StoreFacade,
        target_key: &str,
        wrapper: &str,
    ) -> Result<bool, BridgeError> {
        let (key, function) = target_key.split_once('.').ok_or_else(|| {
            BridgeError::UnexpectedValue(format!("patch target '{}' is not Key.function", target_key))
        })?;

        let mut table = self.table.lock().await;
        if table.facade_instance != Some(facade.instance()) {
            table.facade_instance = Some(facade.instance());
            table.records.clear();
        }
        if let Some(record) = table.records.get(target_key) {
            debug!("patch {} already handled for this facade", target_key);
            return Ok(record.applied);
        }

        let applied = if facade.binding(key).is_none() {
            false
        } else {
            page.evaluate(&install_script(key, function, wrapper))
                .await?
                .as_bool()
                .unwrap_or(false)
        };

        if applied {
            info!("patched {}", target_key);
        } else {
            warn!("patch target {} not found, skipping", target_key);
        }
        table.records.insert(
            target_key.to_string(),
            PatchRecord {
                target_key: target_key.to_string(),
                applied,
            },
        );
        Ok(applied)
    }

    /// Apply every registered patch to `facade`.
    pub async fn apply_all(
        &self,
        page: &dyn PageContext,
        facade: &StoreFacade,
    ) -> Result<Vec<PatchRecord>, BridgeError> {
        let mut records = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let target_key = spec.target_key();
            let applied = self.patch(page, facade, &target_key, spec.wrapper).await?;
            records.push(PatchRecord {
                target_key,
                applied,
            });
        }
        Ok(records)
    }

    /// Records for the most recently patched facade.
    pub async fn records(&self) -> Vec<PatchRecord> {
        self.table.lock().await.records.values().cloned().collect()
    }
}

fn install_script(key: &str, function: &str, wrapper: &str) -> String {
    format!(
        r#"(() => {{
    const owner = {root} && {root}[{key}];
    const name = {function};
    if (!owner || typeof owner[name] !== 'function') {{ return false; }}
    if (owner[name].{marker}) {{ return true; }}
    const original = owner[name];
    const wrapper = ({wrapper});
    const patched = function (...args) {{ return wrapper.call(this, original.bind(this), ...args); }};
    patched.{marker} = true;
    owner[name] = patched;
    return true;
}})()"#,
        root = FACADE_ROOT,
        key = js_str(key),
        function = js_str(function),
        marker = PATCHED_MARKER,
        wrapper = wrapper,
    )
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
