//! Injection session: readiness wait, facade binding and rebinding.
//!
//! ```text
//! NotReady ──► Polling ──► Ready
//!                │ ▲          │
//!   context lost └─┘          │ context recreated
//!                │            ▼
//!                └──► Failed  Polling (fresh bind)
//! ```
//!
//! The readiness budget is one deadline shared by every re-arm cycle. The
//! context listener is subscribed before the first wait and re-runs the
//! whole bind sequence on every recreated main-frame context. Binds are
//! serialized; a bind that finds a facade for the current context epoch
//! returns it instead of building again, and a bind that queued behind an
//! attempt started in its own epoch or later returns that attempt's outcome.

mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use storebridge_cdp::CdpError;
use storebridge_config::{GenerationSetting, SessionConfig};
use tokio::sync::Notify;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::page::PageContext;
use crate::patch::FunctionPatchRegistry;
use crate::registry::{self, Registries};
use crate::store::{StoreBuilder, StoreFacade};

pub use state::InjectionState;

/// Readiness and binding parameters.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Overrides the generation's readiness expression.
    pub ready_expression: Option<String>,
    /// Total budget across re-arm cycles.
    pub ready_timeout: Duration,
    pub generation: GenerationSetting,
    /// Delay before re-arming after context loss.
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ready_expression: config.ready_expression.clone(),
            ready_timeout: Duration::from_millis(config.ready_timeout_ms),
            generation: config.generation,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

type BindOutcome = Result<Arc<StoreFacade>, BridgeError>;

/// A finished bind attempt.
struct Attempt {
    seq: u64,
    /// Context epoch the attempt started in.
    epoch: u64,
    outcome: BindOutcome,
}

/// Owns everything bound to one driven page.
pub struct InjectionSession {
    page: Arc<dyn PageContext>,
    registries: Registries,
    builder: StoreBuilder,
    patches: FunctionPatchRegistry,
    options: SessionOptions,
    state: RwLock<InjectionState>,
    facade: RwLock<Option<Arc<StoreFacade>>>,
    bind_lock: tokio::sync::Mutex<()>,
    last_attempt: Mutex<Option<Attempt>>,
    epoch: AtomicU64,
    rearms: AtomicU32,
    listener: Mutex<Vec<JoinHandle<()>>>,
}

impl InjectionSession {
    pub fn new(page: Arc<dyn PageContext>, options: SessionOptions) -> Self {
        Self {
            page,
            registries: Registries::default(),
            builder: StoreBuilder::default(),
            patches: FunctionPatchRegistry::with_builtin(),
            options,
            state: RwLock::new(InjectionState::NotReady),
            facade: RwLock::new(None),
            bind_lock: tokio::sync::Mutex::new(()),
            last_attempt: Mutex::new(None),
            epoch: AtomicU64::new(0),
            rearms: AtomicU32::new(0),
            listener: Mutex::new(Vec::new()),
        }
    }

    pub fn with_registries(mut self, registries: Registries) -> Self {
        self.registries = registries;
        self
    }

    pub fn with_patches(mut self, patches: FunctionPatchRegistry) -> Self {
        self.patches = patches;
        self
    }

    pub fn page(&self) -> &dyn PageContext {
        self.page.as_ref()
    }

    pub fn state(&self) -> InjectionState {
        *self.state.read()
    }

    /// Most recently published facade, if any.
    pub fn facade(&self) -> Option<Arc<StoreFacade>> {
        self.facade.read().clone()
    }

    pub fn patches(&self) -> &FunctionPatchRegistry {
        &self.patches
    }

    /// Number of main-frame contexts seen since the session started listening.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Re-arms performed over the session's lifetime.
    pub fn rearms(&self) -> u32 {
        self.rearms.load(Ordering::SeqCst)
    }

    /// Start rebinding on every recreated context. Idempotent.
    ///
    /// The epoch moves as soon as a main-frame context appears; rebinds run
    /// on a separate task and coalesce contexts that arrive during a bind.
    pub fn listen(self: &Arc<Self>) {
        let mut listener = self.listener.lock();
        if !listener.is_empty() {
            return;
        }
        let mut events = self.page.context_events();
        let recreated = Arc::new(Notify::new());

        let session = Arc::downgrade(self);
        let notify = Arc::clone(&recreated);
        listener.push(tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("context listener lagged by {} events", skipped);
                        None
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(session) = session.upgrade() else {
                    break;
                };
                let main_frame = session.page.main_frame_id();
                // A lagged receiver may have missed a context; assume it did.
                let is_new = event
                    .is_none_or(|event| event.is_main_context_created(main_frame.as_deref()));
                if !is_new {
                    continue;
                }
                let epoch = session.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                info!("execution context recreated (epoch {}), rebinding", epoch);
                notify.notify_one();
            }
            debug!("context listener stopped");
        }));

        let session = Arc::downgrade(self);
        listener.push(tokio::spawn(async move {
            loop {
                recreated.notified().await;
                let Some(session) = session.upgrade() else {
                    break;
                };
                if let Err(e) = session.bind().await {
                    warn!("rebind after context recreation failed: {}", e);
                }
            }
        }));
    }

    /// Listen for context recreation, then bind.
    pub async fn start(self: &Arc<Self>) -> Result<Arc<StoreFacade>, BridgeError> {
        self.listen();
        self.bind().await
    }

    /// Wait for readiness, build the facade and apply patches.
    ///
    /// Returns the existing facade when it was built in the current context.
    /// A call that waited behind another attempt returns that attempt's
    /// outcome, error included, unless the attempt began in an older context.
    pub async fn bind(&self) -> Result<Arc<StoreFacade>, BridgeError> {
        let called_in = self.epoch();
        let seen = self.attempt_seq();
        let _guard = self.bind_lock.lock().await;
        if let Some(facade) = self.current() {
            debug!("facade {} is current, not rebuilding", facade.instance());
            return Ok(facade);
        }
        if let Some(outcome) = self.finished_since(seen, called_in) {
            debug!("bind attempt finished while queued, sharing its outcome");
            return outcome;
        }

        let started_in = self.epoch();
        let outcome = self.attempt().await;
        self.record(started_in, &outcome);
        outcome
    }

    async fn attempt(&self) -> BindOutcome {
        let deadline = Instant::now() + self.options.ready_timeout;
        let mut rearms = 0u32;
        loop {
            self.wait_ready(deadline, &mut rearms).await?;
            let epoch = self.epoch();
            match self.build(epoch).await {
                Ok(facade) => {
                    let facade = Arc::new(facade);
                    *self.facade.write() = Some(Arc::clone(&facade));
                    self.set_state(InjectionState::Ready);
                    return Ok(facade);
                }
                Err(e) if e.is_context_destroyed() => {
                    rearms += 1;
                    self.rearms.fetch_add(1, Ordering::SeqCst);
                    debug!("context destroyed while binding, re-arming ({})", rearms);
                }
                Err(e) => {
                    self.set_state(InjectionState::Failed);
                    return Err(e);
                }
            }
        }
    }

    fn attempt_seq(&self) -> u64 {
        self.last_attempt.lock().as_ref().map_or(0, |a| a.seq)
    }

    fn finished_since(&self, seen: u64, called_in: u64) -> Option<BindOutcome> {
        self.last_attempt
            .lock()
            .as_ref()
            .filter(|a| a.seq > seen && a.epoch >= called_in)
            .map(|a| a.outcome.clone())
    }

    fn record(&self, epoch: u64, outcome: &BindOutcome) {
        let mut last = self.last_attempt.lock();
        let seq = last.as_ref().map_or(0, |a| a.seq) + 1;
        *last = Some(Attempt {
            seq,
            epoch,
            outcome: outcome.clone(),
        });
    }

    fn current(&self) -> Option<Arc<StoreFacade>> {
        if self.state() != InjectionState::Ready {
            return None;
        }
        self.facade()
            .filter(|facade| facade.epoch() == self.epoch())
    }

    fn ready_expression(&self) -> String {
        self.options
            .ready_expression
            .clone()
            .unwrap_or_else(|| self.registries.ready_expression(self.options.generation))
    }

    async fn wait_ready(&self, deadline: Instant, rearms: &mut u32) -> Result<(), BridgeError> {
        self.set_state(InjectionState::Polling);
        let expression = self.ready_expression();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(*rearms));
            }
            match self.page.wait_for_function(&expression, remaining).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_context_destroyed() => {
                    *rearms += 1;
                    self.rearms.fetch_add(1, Ordering::SeqCst);
                    debug!("context destroyed during readiness wait, re-arming ({})", rearms);
                    tokio::time::sleep(self.options.poll_interval.min(remaining)).await;
                }
                Err(CdpError::Timeout(_)) => return Err(self.timed_out(*rearms)),
                Err(e) => {
                    self.set_state(InjectionState::Failed);
                    return Err(e.into());
                }
            }
        }
    }

    async fn build(&self, epoch: u64) -> Result<StoreFacade, BridgeError> {
        let page = self.page.as_ref();
        let detected = registry::detect(page, self.options.generation).await?;
        let registry = self.registries.for_generation(detected.generation);
        let facade = self
            .builder
            .build(page, registry, epoch, detected.version)
            .await?;
        self.patches.apply_all(page, &facade).await?;
        Ok(facade)
    }

    fn timed_out(&self, rearms: u32) -> BridgeError {
        self.set_state(InjectionState::Failed);
        let budget_ms = self.options.ready_timeout.as_millis() as u64;
        warn!("target not ready within {}ms after {} re-arms", budget_ms, rearms);
        BridgeError::InjectionTimeout { budget_ms, rearms }
    }

    fn set_state(&self, next: InjectionState) {
        let mut state = self.state.write();
        if *state != next {
            debug!("injection state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }
}

impl Drop for InjectionSession {
    fn drop(&mut self) {
        for task in self.listener.lock().drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests;
