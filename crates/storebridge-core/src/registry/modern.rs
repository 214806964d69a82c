//! String-keyed lookup for the modern bundle loader.

use async_trait::async_trait;
use tracing::debug;

use super::{DESCRIBE_JS, Generation, ModuleRef, ModuleRegistry, Selector, js_str};
use crate::error::BridgeError;
use crate::page::PageContext;

/// Modern generation: modules fetched through `window.require(id)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModernRegistry;

#[async_trait]
impl ModuleRegistry for ModernRegistry {
    fn generation(&self) -> Generation {
        Generation::Modern
    }

    fn ready_expression(&self) -> &'static str {
        "(() => { try { return typeof window.require === 'function' && !!window.require('WAWebCollections').Chat; } catch (e) { return false; } })()"
    }

    async fn prepare(&self, page: &dyn PageContext) -> Result<(), BridgeError> {
        let present = page
            .evaluate("typeof window.require === 'function'")
            .await?;
        if present.as_bool() != Some(true) {
            return Err(BridgeError::RegistryUnavailable {
                generation: Generation::Modern,
            });
        }
        Ok(())
    }

    async fn locate(
        &self,
        page: &dyn PageContext,
        selector: &Selector,
    ) -> Result<Option<ModuleRef>, BridgeError> {
        let id = match selector {
            Selector::Id(id) => *id,
            Selector::Match(predicate) => {
                debug!("modern registry cannot scan by predicate {:?}", predicate);
                return Ok(None);
            }
        };

        let expression = format!(
            r#"(() => {{
    {describe}
    let m;
    try {{ m = window.require({id}); }} catch (e) {{ return null; }}
    return m ? describe({id}, m) : null;
}})()"#,
            describe = DESCRIBE_JS,
            id = js_str(id),
        );

        let value = page.evaluate(&expression).await?;
        if value.is_null() {
            debug!("modern registry: module {} not found", id);
            return Ok(None);
        }
        Ok(Some(serde_json::from_value::<ModuleRef>(value)?))
    }

    fn accessor(&self, module: &ModuleRef) -> String {
        format!("window.require({})", js_str(&module.id))
    }
}
