//! Browser-control boundary consumed by the bridging layer.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use storebridge_cdp::{CdpError, PageEvent};
use tokio::sync::broadcast;

/// One driven page, as seen by the bridge.
///
/// Errors use the driver's structured [`CdpError`]; context loss is always
/// reported as [`CdpError::ContextDestroyed`].
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Evaluate an expression in the page's current context. Promises are awaited.
    async fn evaluate(&self, expression: &str) -> Result<Value, CdpError>;

    /// Wait until `expression` is truthy.
    ///
    /// A single in-flight wait. Fails with `ContextDestroyed` when the context
    /// is replaced first, and with `Timeout` when `timeout` elapses.
    async fn wait_for_function(&self, expression: &str, timeout: Duration)
    -> Result<(), CdpError>;

    /// Subscribe to page events; only events after the call are delivered.
    fn context_events(&self) -> broadcast::Receiver<PageEvent>;

    /// Frame ID of the top-level frame, if known.
    fn main_frame_id(&self) -> Option<String>;

    /// Load a script into the current document.
    async fn inject_script(&self, source: &str) -> Result<(), CdpError>;

    /// Serve `body` for document requests under `url_prefix`.
    async fn serve_document(&self, url_prefix: &str, body: String) -> Result<(), CdpError>;

    /// Raw source of the currently loaded document.
    async fn document_source(&self) -> Result<String, CdpError>;
}
