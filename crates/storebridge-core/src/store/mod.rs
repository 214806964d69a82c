//! Canonical facade over the target's internal modules.
//!
//! [`catalog`] declares every key once per generation, [`StoreBuilder`]
//! resolves them through a [`ModuleRegistry`](crate::registry::ModuleRegistry)
//! and publishes the result, and [`StoreFacade`] is the immutable outcome.

mod builder;
pub mod catalog;
mod facade;
mod shims;

pub use builder::StoreBuilder;
pub use catalog::{CATALOG, FacadeKey, Resolution};
pub use facade::{BoundExport, Binding, FACADE_ROOT, StoreFacade};
pub use shims::{SHIMS, Shim};
