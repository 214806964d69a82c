//! Indexed registry scan for the legacy bundle loader.

use async_trait::async_trait;
use tracing::debug;

use super::{DESCRIBE_JS, Generation, ModuleRef, ModuleRegistry, Selector, js_str};
use crate::error::BridgeError;
use crate::page::PageContext;

const LOADER_JS: &str = include_str!("legacy_loader.js");

const RAID: &str = "window.__storebridgeRaid";

const INSTALLED_JS: &str = "!!(window.__storebridgeRaid && window.__storebridgeRaid.modules)";

/// Legacy generation: one chunk-pushed loader, modules located by predicate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyRegistry;

#[async_trait]
impl ModuleRegistry for LegacyRegistry {
    fn generation(&self) -> Generation {
        Generation::Legacy
    }

    fn ready_expression(&self) -> &'static str {
        "Object.keys(window).some((k) => k.startsWith('webpackChunk')) && !!(window.Debug && window.Debug.VERSION)"
    }

    async fn prepare(&self, page: &dyn PageContext) -> Result<(), BridgeError> {
        page.inject_script(LOADER_JS).await?;
        let installed = page.evaluate(INSTALLED_JS).await?;
        if installed.as_bool() != Some(true) {
            return Err(BridgeError::RegistryUnavailable {
                generation: Generation::Legacy,
            });
        }
        Ok(())
    }

    async fn locate(
        &self,
        page: &dyn PageContext,
        selector: &Selector,
    ) -> Result<Option<ModuleRef>, BridgeError> {
        let expression = match selector {
            Selector::Match(predicate) => format!(
                r#"(() => {{
    {describe}
    const mods = {raid}.modules;
    for (const id of Object.keys(mods)) {{
        const m = mods[id];
        if (m && {test}) {{ return describe(id, m); }}
    }}
    return null;
}})()"#,
                describe = DESCRIBE_JS,
                raid = RAID,
                test = predicate.to_js(),
            ),
            Selector::Id(id) => format!(
                r#"(() => {{
    {describe}
    const m = {raid}.modules[{id}];
    return m ? describe({id}, m) : null;
}})()"#,
                describe = DESCRIBE_JS,
                raid = RAID,
                id = js_str(id),
            ),
        };

        let value = page.evaluate(&expression).await?;
        if value.is_null() {
            debug!("legacy registry: no module for {:?}", selector);
            return Ok(None);
        }
        Ok(Some(serde_json::from_value::<ModuleRef>(value)?))
    }

    fn accessor(&self, module: &ModuleRef) -> String {
        format!("{}.modules[{}]", RAID, js_str(&module.id))
    }
}

