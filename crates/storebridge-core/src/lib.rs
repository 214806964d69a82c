//! # storebridge Core
//!
//! The compatibility and bridging layer between a driven browser page and
//! the target application's private module graph.
//!
//! - [`cache`]: bundle snapshot stores (none / local / remote)
//! - [`pin`]: serving a cached snapshot in place of the live document
//! - [`registry`]: module discovery for the legacy and modern loaders
//! - [`store`]: canonical key catalog, facade construction and shims
//! - [`session`]: readiness wait, binding and rebinding across context loss
//! - [`probe`]: ordered capability fallback
//! - [`patch`]: idempotent function wrapping
//! - [`presence`]: presence subscription and read over the probe
//! - [`bridge`]: end-to-end bootstrap against a real browser

pub mod bridge;
pub mod cache;
mod cdp_page;
mod error;
pub mod page;
pub mod patch;
pub mod pin;
pub mod presence;
pub mod probe;
pub mod registry;
pub mod session;
pub mod store;
pub mod version;

#[cfg(test)]
mod testing;

pub use bridge::Bridge;
pub use cache::{VersionCache, VersionCacheError};
pub use cdp_page::CdpPage;
pub use error::BridgeError;
pub use page::PageContext;
pub use patch::{FunctionPatchRegistry, PatchRecord, PatchSpec};
pub use pin::{PinOutcome, VersionPin};
pub use presence::PresenceRecord;
pub use probe::CapabilityProbe;
pub use registry::{Generation, ModuleRegistry, Registries};
pub use session::{InjectionSession, InjectionState, SessionOptions};
pub use store::{StoreBuilder, StoreFacade};
pub use version::WebVersion;
