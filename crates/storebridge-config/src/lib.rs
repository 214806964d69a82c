//! # storebridge Config
//!
//! Configuration management for storebridge: browser attachment, bundle
//! version pinning and injection session tuning.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
