//! Facade construction from a module registry.

use tracing::{debug, info};

use super::catalog::{CATALOG, FacadeKey, Resolution};
use super::facade::{BoundExport, Binding, FACADE_ROOT, StoreFacade};
use super::shims;
use crate::error::BridgeError;
use crate::page::PageContext;
use crate::registry::{ModuleDescriptor, ModuleRegistry};

/// Builds a [`StoreFacade`] for one registry generation.
#[derive(Debug, Clone, Copy)]
pub struct StoreBuilder {
    catalog: &'static [FacadeKey],
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new(CATALOG)
    }
}

impl StoreBuilder {
    pub fn new(catalog: &'static [FacadeKey]) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'static [FacadeKey] {
        self.catalog
    }

    /// Resolve every key, publish the facade in the page and run the shims.
    ///
    /// The first key that cannot be resolved fails the build with
    /// [`BridgeError::ModuleResolution`]; nothing is published in that case.
    pub async fn build(
        &self,
        page: &dyn PageContext,
        registry: &dyn ModuleRegistry,
        epoch: u64,
        version: Option<String>,
    ) -> Result<StoreFacade, BridgeError> {
        let generation = registry.generation();
        registry.prepare(page).await?;

        let mut bindings = Vec::with_capacity(self.catalog.len());
        for key in self.catalog {
            let sources = self
                .resolve_key(page, registry, key)
                .await?
                .ok_or_else(|| BridgeError::ModuleResolution {
                    key: key.name.to_string(),
                })?;
            debug!("bound {} from {} source(s)", key.name, sources.len());
            bindings.push(Binding {
                key: key.name,
                sources,
            });
        }

        page.evaluate(&install_script(&bindings)).await?;

        info!(
            "facade bound: {} keys, {} registry, version {}",
            bindings.len(),
            generation,
            version.as_deref().unwrap_or("unknown")
        );
        Ok(StoreFacade::new(generation, epoch, version, bindings))
    }

    async fn resolve_key(
        &self,
        page: &dyn PageContext,
        registry: &dyn ModuleRegistry,
        key: &FacadeKey,
    ) -> Result<Option<Vec<BoundExport>>, BridgeError> {
        match key.resolution(registry.generation()) {
            Resolution::One(descriptor) => Ok(resolve_one(page, registry, descriptor)
                .await?
                .map(|export| vec![export])),
            Resolution::FirstOf(candidates) => {
                for descriptor in candidates.iter() {
                    if let Some(export) = resolve_one(page, registry, descriptor).await? {
                        return Ok(Some(vec![export]));
                    }
                }
                Ok(None)
            }
            Resolution::Union(parts) => {
                let mut sources = Vec::with_capacity(parts.len());
                for descriptor in parts.iter() {
                    match resolve_one(page, registry, descriptor).await? {
                        Some(export) => sources.push(export),
                        None => {
                            debug!("{}: constituent {:?} missing", key.name, descriptor);
                            return Ok(None);
                        }
                    }
                }
                Ok(Some(sources))
            }
        }
    }
}

async fn resolve_one(
    page: &dyn PageContext,
    registry: &dyn ModuleRegistry,
    descriptor: &ModuleDescriptor,
) -> Result<Option<BoundExport>, BridgeError> {
    let Some(module) = registry.locate(page, &descriptor.selector).await? else {
        return Ok(None);
    };
    if !descriptor.export.present_in(&module) {
        debug!("module {} lacks export {:?}", module.id, descriptor.export);
        return Ok(None);
    }
    Ok(Some(BoundExport {
        expression: format!("{}{}", registry.accessor(&module), descriptor.export.js_suffix()),
        module: module.id,
    }))
}

/// Single evaluation assembling `S`, running the shims and publishing it.
pub(crate) fn install_script(bindings: &[Binding]) -> String {
    let mut script = String::from("(() => {\nconst S = {};\n");
    for binding in bindings {
        script.push_str(&format!(
            "S[{}] = {};\n",
            crate::registry::js_str(binding.key),
            binding.expression()
        ));
    }
    script.push_str(&shims::script());
    script.push_str(&format!("\n{} = S;\nreturn Object.keys(S).length;\n}})()", FACADE_ROOT));
    script
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
