//! [`PageContext`] over a live CDP page session.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use storebridge_cdp::{CdpError, PageEvent, PageSession};
use tokio::sync::broadcast;

use crate::page::PageContext;

/// A CDP page driven by the bridge.
pub struct CdpPage {
    session: PageSession,
    poll_interval: Duration,
}

impl CdpPage {
    pub fn new(session: PageSession, poll_interval: Duration) -> Self {
        Self {
            session,
            poll_interval,
        }
    }

    /// Underlying CDP session.
    pub fn session(&self) -> &PageSession {
        &self.session
    }
}

#[async_trait]
impl PageContext for CdpPage {
    async fn evaluate(&self, expression: &str) -> Result<Value, CdpError> {
        self.session.evaluate(expression).await
    }

    async fn wait_for_function(
        &self,
        expression: &str,
        timeout: Duration,
    ) -> Result<(), CdpError> {
        self.session
            .wait_for_function(expression, timeout, self.poll_interval)
            .await
    }

    fn context_events(&self) -> broadcast::Receiver<PageEvent> {
        self.session.subscribe()
    }

    fn main_frame_id(&self) -> Option<String> {
        self.session.main_frame_id()
    }

    async fn inject_script(&self, source: &str) -> Result<(), CdpError> {
        self.session.inject_script(source).await
    }

    async fn serve_document(&self, url_prefix: &str, body: String) -> Result<(), CdpError> {
        self.session.serve_document(url_prefix, body).await
    }

    async fn document_source(&self) -> Result<String, CdpError> {
        self.session.document_source().await
    }
}
