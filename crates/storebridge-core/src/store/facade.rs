//! The bound facade: canonical key -> resolved page expression.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tracing::debug;

use crate::error::BridgeError;
use crate::page::PageContext;
use crate::registry::{Generation, js_str};

/// Global object the facade is published under in the page.
pub const FACADE_ROOT: &str = "window.Store";

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// One module export feeding a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundExport {
    pub module: String,
    /// Expression evaluating to the export in the page.
    pub expression: String,
}

/// A resolved canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub key: &'static str,
    pub sources: Vec<BoundExport>,
}

impl Binding {
    /// Expression producing the bound value; composite keys merge every source.
    pub fn expression(&self) -> String {
        match self.sources.as_slice() {
            [single] => single.expression.clone(),
            many => {
                let parts: Vec<&str> = many.iter().map(|s| s.expression.as_str()).collect();
                format!("Object.assign({{}}, {})", parts.join(", "))
            }
        }
    }

    pub fn is_composite(&self) -> bool {
        self.sources.len() > 1
    }
}

/// An immutable, fully bound facade.
///
/// Produced whole by [`StoreBuilder`](super::StoreBuilder) or not at all.
/// Each build gets a fresh `instance` id; patches are tracked against it.
#[derive(Debug)]
pub struct StoreFacade {
    instance: u64,
    generation: Generation,
    epoch: u64,
    version: Option<String>,
    bindings: Vec<Binding>,
}

impl StoreFacade {
    pub(crate) fn new(
        generation: Generation,
        epoch: u64,
        version: Option<String>,
        bindings: Vec<Binding>,
    ) -> Self {
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            generation,
            epoch,
            version,
            bindings,
        }
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Context epoch this facade was built in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Bundle version reported by the page at build time.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Canonical keys in resolution order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.bindings.iter().map(|b| b.key).collect()
    }

    pub fn binding(&self, key: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.key == key)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Page expression for `key.member` on the published facade.
    pub fn member_expr(&self, key: &str, member: &str) -> String {
        format!("{}[{}][{}]", FACADE_ROOT, js_str(key), js_str(member))
    }

    /// Whether `key.member` exists and is callable. Page errors count as `false`.
    pub async fn is_callable(&self, page: &dyn PageContext, key: &str, member: &str) -> bool {
        if self.binding(key).is_none() {
            return false;
        }
        let expression = format!(
            "(() => {{ try {{ return typeof {} === 'function'; }} catch (e) {{ return false; }} }})()",
            self.member_expr(key, member)
        );
        match page.evaluate(&expression).await {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(e) => {
                debug!("callable check for {}.{} failed: {}", key, member, e);
                false
            }
        }
    }

    /// Invoke `key.member(...args)` in the page and return its (awaited) result.
    ///
    /// Fails fast: a replaced context surfaces as [`BridgeError::ContextDestroyed`].
    pub async fn call(
        &self,
        page: &dyn PageContext,
        key: &str,
        member: &str,
        args: &[Value],
    ) -> Result<Value, BridgeError> {
        if self.binding(key).is_none() {
            return Err(BridgeError::ModuleResolution {
                key: key.to_string(),
            });
        }
        let args: Vec<String> = args.iter().map(Value::to_string).collect();
        let expression = format!(
            "(async () => {{ const owner = {root}[{key}]; return await owner[{member}]({args}); }})()",
            root = FACADE_ROOT,
            key = js_str(key),
            member = js_str(member),
            args = args.join(", "),
        );
        Ok(page.evaluate(&expression).await?)
    }
}
