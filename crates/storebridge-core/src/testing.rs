//! Scripted page and in-memory registry for exercising the bridge without a browser.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use storebridge_cdp::{CdpError, PageEvent};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::BridgeError;
use crate::page::PageContext;
use crate::registry::{
    ExportKind, ExportPath, Generation, ModuleDescriptor, ModuleRef, ModuleRegistry, Predicate,
    Selector, js_str,
};
use crate::store::CATALOG;
use crate::version::WebVersion;

/// Frame ID of every [`FakePage`] top-level context.
pub const MAIN_FRAME: &str = "main";

type Evaluator = Box<dyn Fn(&str) -> Result<Value, CdpError> + Send + Sync>;

/// One execution context on a [`FakePage`] timeline.
#[derive(Debug, Clone, Copy)]
pub struct FakeContext {
    /// Offset from page creation at which this context replaces the previous one.
    pub starts_at: Duration,
    /// Delay after `starts_at` until readiness holds; `None` never becomes ready.
    pub ready_after: Option<Duration>,
}

impl FakeContext {
    pub fn at(starts_at_ms: u64, ready_after_ms: Option<u64>) -> Self {
        Self {
            starts_at: Duration::from_millis(starts_at_ms),
            ready_after: ready_after_ms.map(Duration::from_millis),
        }
    }
}

/// A page whose contexts follow a fixed timeline in (virtual) time.
pub struct FakePage {
    origin: Instant,
    contexts: Vec<FakeContext>,
    events: broadcast::Sender<PageEvent>,
    evaluator: Evaluator,
    pub evaluations: Mutex<Vec<String>>,
    pub waits: AtomicUsize,
    pub injected: Mutex<Vec<String>>,
    pub served: Mutex<Vec<(String, String)>>,
    pub source: Mutex<Option<String>>,
}

impl FakePage {
    /// Single context, ready immediately.
    pub fn ready() -> Self {
        Self::with_timeline(vec![FakeContext::at(0, Some(0))])
    }

    pub fn with_timeline(contexts: Vec<FakeContext>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            origin: Instant::now(),
            contexts,
            events,
            evaluator: Box::new(|_| Ok(Value::Null)),
            evaluations: Mutex::new(Vec::new()),
            waits: AtomicUsize::new(0),
            injected: Mutex::new(Vec::new()),
            served: Mutex::new(Vec::new()),
            source: Mutex::new(None),
        }
    }

    pub fn on_evaluate(
        mut self,
        evaluator: impl Fn(&str) -> Result<Value, CdpError> + Send + Sync + 'static,
    ) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    pub fn with_source(self, source: &str) -> Self {
        *self.source.lock() = Some(source.to_string());
        self
    }

    /// Start emitting `ContextCreated` at every later context start.
    pub fn start(self) -> Arc<Self> {
        let page = Arc::new(self);
        let events = page.events.clone();
        let origin = page.origin;
        let starts: Vec<Duration> = page.contexts.iter().skip(1).map(|c| c.starts_at).collect();
        tokio::spawn(async move {
            for (i, at) in starts.into_iter().enumerate() {
                tokio::time::sleep_until(origin + at).await;
                let _ = events.send(PageEvent::ContextCreated {
                    context_id: i as i64 + 2,
                    frame_id: Some(MAIN_FRAME.to_string()),
                    is_default: true,
                });
            }
        });
        page
    }

    /// Deliver an event to current subscribers.
    pub fn emit(&self, event: PageEvent) {
        let _ = self.events.send(event);
    }

    pub fn evaluated(&self, needle: &str) -> usize {
        self.evaluations
            .lock()
            .iter()
            .filter(|e| e.contains(needle))
            .count()
    }
}

#[async_trait]
impl PageContext for FakePage {
    async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        self.evaluations.lock().push(expression.to_string());
        (self.evaluator)(expression)
    }

    async fn wait_for_function(
        &self,
        _expression: &str,
        timeout: Duration,
    ) -> Result<(), CdpError> {
        self.waits.fetch_add(1, Ordering::SeqCst);
        let now = self.origin.elapsed();
        let index = self
            .contexts
            .iter()
            .rposition(|c| c.starts_at <= now)
            .unwrap_or(0);
        let context = self.contexts[index];
        let ends_at = self.contexts.get(index + 1).map(|c| c.starts_at);
        let ready_at = context
            .ready_after
            .map(|delay| context.starts_at + delay)
            .filter(|ready| ends_at.is_none_or(|end| *ready < end));
        let deadline = now + timeout;

        let mut outcomes: Vec<(Duration, u8)> = vec![(deadline, 2)];
        if let Some(end) = ends_at {
            outcomes.push((end, 1));
        }
        if let Some(ready) = ready_at {
            outcomes.push((ready.max(now), 0));
        }
        let (at, outcome) = outcomes.into_iter().min().unwrap_or((deadline, 2));

        tokio::time::sleep_until(self.origin + at).await;
        match outcome {
            0 => Ok(()),
            1 => Err(CdpError::ContextDestroyed(
                "Execution context was destroyed.".to_string(),
            )),
            _ => Err(CdpError::Timeout(format!(
                "condition not met within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn context_events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    fn main_frame_id(&self) -> Option<String> {
        Some(MAIN_FRAME.to_string())
    }

    async fn inject_script(&self, source: &str) -> Result<(), CdpError> {
        self.injected.lock().push(source.to_string());
        Ok(())
    }

    async fn serve_document(&self, url_prefix: &str, body: String) -> Result<(), CdpError> {
        self.served.lock().push((url_prefix.to_string(), body));
        Ok(())
    }

    async fn document_source(&self) -> Result<String, CdpError> {
        self.source
            .lock()
            .clone()
            .ok_or_else(|| CdpError::InvalidResponse("no document".to_string()))
    }
}

/// Answers generation detection for `version` and reports patches as applied.
pub fn page_script(version: &'static str) -> impl Fn(&str) -> Result<Value, CdpError> + Send + Sync {
    move |expression| {
        if expression.contains("lookup:") {
            let modern = version
                .parse::<WebVersion>()
                .map(|v| v.has_modern_registry())
                .unwrap_or(false);
            Ok(json!({ "version": version, "lookup": modern }))
        } else if expression.contains("__storebridgePatched") {
            Ok(Value::Bool(true))
        } else {
            Ok(Value::Null)
        }
    }
}

/// Registry backed by a fixed module list, in registry order.
pub struct MemoryRegistry {
    generation: Generation,
    modules: Vec<ModuleRef>,
    pub locates: AtomicUsize,
    pub prepares: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new(generation: Generation, modules: Vec<ModuleRef>) -> Self {
        Self {
            generation,
            modules,
            locates: AtomicUsize::new(0),
            prepares: AtomicUsize::new(0),
        }
    }

    /// Registry satisfying every catalog key for `generation`.
    pub fn complete(generation: Generation) -> Self {
        Self::new(generation, synthesize(generation))
    }

    /// Drop modules exporting `name` at the top level or under `default`,
    /// or with id `name`.
    pub fn without(mut self, name: &str) -> Self {
        self.modules.retain(|m| {
            m.id != name && !m.exports.contains_key(name) && !m.default_exports.contains_key(name)
        });
        self
    }

    pub fn push(mut self, module: ModuleRef) -> Self {
        self.modules.push(module);
        self
    }
}

#[async_trait]
impl ModuleRegistry for MemoryRegistry {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn ready_expression(&self) -> &'static str {
        "window.__memoryReady === true"
    }

    async fn prepare(&self, _page: &dyn PageContext) -> Result<(), BridgeError> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn locate(
        &self,
        _page: &dyn PageContext,
        selector: &Selector,
    ) -> Result<Option<ModuleRef>, BridgeError> {
        self.locates.fetch_add(1, Ordering::SeqCst);
        let found = match selector {
            Selector::Match(predicate) => self.modules.iter().find(|m| predicate.matches(m)),
            Selector::Id(id) => self.modules.iter().find(|m| m.id == *id),
        };
        Ok(found.cloned())
    }

    fn accessor(&self, module: &ModuleRef) -> String {
        format!("__memory[{}]", js_str(&module.id))
    }
}

pub fn module(id: &str, exports: &[&str], default_exports: &[&str]) -> ModuleRef {
    let kinds = |names: &[&str]| -> BTreeMap<String, ExportKind> {
        names
            .iter()
            .map(|n| (n.to_string(), ExportKind::Function))
            .collect()
    };
    let mut exports = kinds(exports);
    if !default_exports.is_empty() {
        exports.insert("default".to_string(), ExportKind::Object);
    }
    ModuleRef {
        id: id.to_string(),
        exports,
        default_exports: kinds(default_exports),
    }
}

fn satisfy(module: &mut ModuleRef, predicate: &Predicate) {
    match predicate {
        Predicate::HasExport(name) => {
            module.exports.insert(name.to_string(), ExportKind::Function);
        }
        Predicate::DefaultHas(name) => {
            module.exports.insert("default".to_string(), ExportKind::Object);
            module
                .default_exports
                .insert(name.to_string(), ExportKind::Object);
        }
        Predicate::All(all) => all.iter().for_each(|p| satisfy(module, p)),
    }
}

fn provide(module: &mut ModuleRef, export: &ExportPath) {
    match export {
        ExportPath::Module => {}
        ExportPath::Named(name) => {
            module.exports.insert(name.to_string(), ExportKind::Object);
        }
        ExportPath::Default => {
            module.exports.insert("default".to_string(), ExportKind::Object);
        }
        ExportPath::DefaultNamed(name) => {
            module.exports.insert("default".to_string(), ExportKind::Object);
            module
                .default_exports
                .insert(name.to_string(), ExportKind::Object);
        }
    }
}

fn synthesize(generation: Generation) -> Vec<ModuleRef> {
    let mut modules: Vec<ModuleRef> = Vec::new();
    let descriptors: Vec<&ModuleDescriptor> = CATALOG
        .iter()
        .flat_map(|key| key.resolution(generation).descriptors().iter())
        .collect();

    for descriptor in descriptors {
        match descriptor.selector {
            Selector::Id(id) => {
                let index = match modules.iter().position(|m| m.id == id) {
                    Some(index) => index,
                    None => {
                        modules.push(module(id, &[], &[]));
                        modules.len() - 1
                    }
                };
                provide(&mut modules[index], &descriptor.export);
            }
            Selector::Match(predicate) => {
                let mut m = module(&(1000 + modules.len()).to_string(), &[], &[]);
                satisfy(&mut m, &predicate);
                provide(&mut m, &descriptor.export);
                modules.push(m);
            }
        }
    }
    modules
}

#[test]
fn test_synthesized_registries_cover_catalog() {
    for generation in [Generation::Legacy, Generation::Modern] {
        let modules = synthesize(generation);
        for key in CATALOG {
            for d in key.resolution(generation).descriptors() {
                let found = match d.selector {
                    Selector::Id(id) => modules.iter().find(|m| m.id == id),
                    Selector::Match(p) => modules.iter().find(|m| p.matches(m)),
                };
                assert!(
                    found.is_some_and(|m| d.export.present_in(m)),
                    "{} unresolved for {}",
                    key.name,
                    generation
                );
            }
        }
    }
}
