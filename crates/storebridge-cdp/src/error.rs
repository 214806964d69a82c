//! CDP error types.

use std::sync::Arc;

use thiserror::Error;

/// DevTools messages reporting that the execution context an operation ran in
/// has gone away (navigation, reload, frame detach).
const CONTEXT_DESTROYED_MESSAGES: &[&str] = &[
    "Execution context was destroyed",
    "Cannot find context with specified id",
    "Cannot find default execution context",
    "Inspected target navigated or closed",
];

/// CDP client errors.
#[derive(Debug, Clone, Error)]
pub enum CdpError {
    /// Failed to connect to Chrome.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Chrome not found or not running with remote debugging.
    #[error("Chrome not available at {0}. Start Chrome with: chrome --remote-debugging-port=9222")]
    ChromeNotAvailable(String),

    /// Chrome could not be launched.
    #[error("Failed to launch Chrome: {0}")]
    LaunchFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// CDP protocol error.
    #[error("CDP error: {message} (code: {code})")]
    Protocol { code: i64, message: String },

    /// The page's execution context was replaced while the call was in flight.
    #[error("Execution context destroyed: {0}")]
    ContextDestroyed(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),

    /// HTTP error (for endpoint discovery).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Navigation failed.
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// JavaScript execution error.
    #[error("JavaScript error: {0}")]
    JavaScript(String),

    /// Timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Session closed.
    #[error("Session closed")]
    SessionClosed,

    /// Invalid response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CdpError {
    /// Build an error from a protocol error response, classifying context loss.
    pub fn protocol(code: i64, message: String) -> Self {
        if is_context_destroyed_message(&message) {
            CdpError::ContextDestroyed(message)
        } else {
            CdpError::Protocol { code, message }
        }
    }

    /// Whether this error means the execution context was destroyed mid-call.
    pub fn is_context_destroyed(&self) -> bool {
        matches!(self, CdpError::ContextDestroyed(_))
    }
}

fn is_context_destroyed_message(message: &str) -> bool {
    CONTEXT_DESTROYED_MESSAGES
        .iter()
        .any(|known| message.starts_with(known))
}

impl From<serde_json::Error> for CdpError {
    fn from(e: serde_json::Error) -> Self {
        CdpError::Serialization(Arc::new(e))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for CdpError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        CdpError::WebSocket(e.to_string())
    }
}

impl From<reqwest::Error> for CdpError {
    fn from(e: reqwest::Error) -> Self {
        CdpError::Http(e.to_string())
    }
}

impl From<url::ParseError> for CdpError {
    fn from(e: url::ParseError) -> Self {
        CdpError::ConnectionFailed(format!("Invalid URL: {}", e))
    }
}
