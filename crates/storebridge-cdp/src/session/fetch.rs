//! Main-document interception and document source capture.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::client::{COMMAND_TIMEOUT, Commander};
use crate::error::CdpError;
use crate::protocol::PageEvent;

use super::core::PageSession;

impl PageSession {
    /// Fulfil every document request whose URL starts with `url_prefix` with `body`.
    ///
    /// Other paused requests are continued untouched. Interception stays
    /// active for the lifetime of the session.
    pub async fn serve_document(&self, url_prefix: &str, body: String) -> Result<(), CdpError> {
        // Subscribe before enabling so no paused request slips past.
        let mut events = self.subscribe();

        self.call(
            "Fetch.enable",
            Some(json!({
                "patterns": [{
                    "urlPattern": format!("{}*", url_prefix),
                    "resourceType": "Document",
                    "requestStage": "Request",
                }]
            })),
        )
        .await?;

        let commander = self.commander.clone();
        let session_id = self.session_id.clone();
        let prefix = url_prefix.to_string();
        let encoded = BASE64.encode(body.as_bytes());

        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("document interception lagged by {} events", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                let PageEvent::RequestPaused {
                    request_id, url, ..
                } = event
                else {
                    continue;
                };

                let result = if url.starts_with(&prefix) {
                    info!("serving pinned document for {}", url);
                    fulfill(&commander, &session_id, &request_id, &encoded).await
                } else {
                    commander
                        .send(
                            "Fetch.continueRequest",
                            Some(json!({ "requestId": request_id })),
                            Some(&session_id),
                            COMMAND_TIMEOUT,
                        )
                        .await
                        .map(|_| ())
                };

                if let Err(e) = result {
                    warn!("failed to resolve paused request {}: {}", url, e);
                }
            }
        });

        self.track(task);
        Ok(())
    }

    /// Raw source of the last main document response, falling back to the live DOM.
    pub async fn document_source(&self) -> Result<String, CdpError> {
        let request_id = self.last_document.lock().clone();

        if let Some(request_id) = request_id {
            match self
                .call(
                    "Network.getResponseBody",
                    Some(json!({ "requestId": request_id })),
                )
                .await
            {
                Ok(result) => return decode_body(&result),
                Err(e) => debug!("response body unavailable ({}), using DOM", e),
            }
        }

        let html = self.evaluate("document.documentElement.outerHTML").await?;
        Ok(html.as_str().unwrap_or_default().to_string())
    }
}

async fn fulfill(
    commander: &Commander,
    session_id: &str,
    request_id: &str,
    encoded_body: &str,
) -> Result<(), CdpError> {
    commander
        .send(
            "Fetch.fulfillRequest",
            Some(json!({
                "requestId": request_id,
                "responseCode": 200,
                "responseHeaders": [
                    {"name": "Content-Type", "value": "text/html; charset=utf-8"}
                ],
                "body": encoded_body,
            })),
            Some(session_id),
            COMMAND_TIMEOUT,
        )
        .await?;
    Ok(())
}

/// Decode a `Network.getResponseBody` result.
pub(crate) fn decode_body(result: &serde_json::Value) -> Result<String, CdpError> {
    let body = result["body"]
        .as_str()
        .ok_or_else(|| CdpError::InvalidResponse("Missing response body".to_string()))?;

    if result["base64Encoded"].as_bool().unwrap_or(false) {
        let bytes = BASE64
            .decode(body)
            .map_err(|e| CdpError::InvalidResponse(format!("Invalid base64 body: {}", e)))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(body.to_string())
    }
}
