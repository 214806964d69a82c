//! Navigation and page setup operations for CDP page session.

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::debug;

use crate::error::CdpError;

use super::core::PageSession;

impl PageSession {
    /// Navigate to URL and wait for the document to become interactive.
    pub async fn navigate(&self, url: &str) -> Result<String, CdpError> {
        let result = self
            .call("Page.navigate", Some(json!({"url": url})))
            .await?;

        if let Some(error) = result.get("errorText") {
            return Err(CdpError::NavigationFailed(
                error.as_str().unwrap_or("Unknown error").to_string(),
            ));
        }

        let frame_id = result["frameId"].as_str().unwrap_or("main").to_string();

        self.wait_for_load(Duration::from_secs(30)).await?;

        debug!("Navigated to {}", url);
        Ok(frame_id)
    }

    /// Wait for page load. Context replacement during the wait is expected.
    pub async fn wait_for_load(&self, timeout: Duration) -> Result<(), CdpError> {
        let start = Instant::now();

        loop {
            match self.evaluate("document.readyState").await {
                Ok(state) => {
                    if let Some(state) = state.as_str() {
                        if state == "complete" || state == "interactive" {
                            return Ok(());
                        }
                    }
                }
                Err(e) if e.is_context_destroyed() => {
                    debug!("context replaced while waiting for load");
                }
                Err(e) => return Err(e),
            }

            if start.elapsed() > timeout {
                return Err(CdpError::Timeout("Page load timeout".to_string()));
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Override the user agent for this page.
    pub async fn set_user_agent(&self, user_agent: &str) -> Result<(), CdpError> {
        self.call(
            "Network.setUserAgentOverride",
            Some(json!({ "userAgent": user_agent })),
        )
        .await?;
        Ok(())
    }

    /// Ignore the page's Content-Security-Policy so injected code can run.
    pub async fn set_bypass_csp(&self, enabled: bool) -> Result<(), CdpError> {
        self.call("Page.setBypassCSP", Some(json!({ "enabled": enabled })))
            .await?;
        Ok(())
    }
}
