//! Ordered capability fallback.
//!
//! Each strategy pairs an availability check with an invocation. Strategies
//! are tried in declaration order, evaluated at call time and never cached.
//! An unavailable strategy is skipped without being invoked; an invocation
//! yielding `Ok(None)` or an error moves on to the next one. The probe itself
//! never fails: exhausting every strategy yields `None`.

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::BridgeError;

type Available<'a> = Box<dyn Fn() -> BoxFuture<'a, bool> + Send + Sync + 'a>;
type Invoke<'a, T> = Box<dyn Fn() -> BoxFuture<'a, Result<Option<T>, BridgeError>> + Send + Sync + 'a>;

struct Strategy<'a, T> {
    name: &'static str,
    available: Available<'a>,
    invoke: Invoke<'a, T>,
}

/// An ordered list of `(availability, invocation)` pairs.
pub struct CapabilityProbe<'a, T> {
    capability: &'static str,
    strategies: Vec<Strategy<'a, T>>,
}

impl<'a, T: Send + 'a> CapabilityProbe<'a, T> {
    pub fn new(capability: &'static str) -> Self {
        Self {
            capability,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy.
    pub fn strategy<A, AF, I, IF>(mut self, name: &'static str, available: A, invoke: I) -> Self
    where
        A: Fn() -> AF + Send + Sync + 'a,
        AF: Future<Output = bool> + Send + 'a,
        I: Fn() -> IF + Send + Sync + 'a,
        IF: Future<Output = Result<Option<T>, BridgeError>> + Send + 'a,
    {
        self.strategies.push(Strategy {
            name,
            available: Box::new(move || available().boxed()),
            invoke: Box::new(move || invoke().boxed()),
        });
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name).collect()
    }

    /// Run the first available strategy that succeeds.
    pub async fn run(&self) -> Option<T> {
        for strategy in &self.strategies {
            if !(strategy.available)().await {
                debug!("{}: {} unavailable", self.capability, strategy.name);
                continue;
            }
            match (strategy.invoke)().await {
                Ok(Some(value)) => {
                    debug!("{}: {} succeeded", self.capability, strategy.name);
                    return Some(value);
                }
                Ok(None) => debug!("{}: {} produced nothing", self.capability, strategy.name),
                Err(e) => debug!("{}: {} failed: {}", self.capability, strategy.name, e),
            }
        }
        debug!("{}: no strategy succeeded", self.capability);
        None
    }
}
