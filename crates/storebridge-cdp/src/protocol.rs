//! CDP protocol types and message definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// CDP request message.
#[derive(Debug, Serialize)]
pub struct CdpRequest {
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP response message.
#[derive(Debug, Deserialize)]
pub struct CdpResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    pub error: Option<CdpErrorResponse>,
    pub method: Option<String>,
    pub params: Option<Value>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// CDP error in response.
#[derive(Debug, Deserialize)]
pub struct CdpErrorResponse {
    pub code: i64,
    pub message: String,
    pub data: Option<String>,
}

/// Target info from CDP.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub title: String,
    pub url: String,
    pub attached: Option<bool>,
}

/// Page info from /json endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub page_type: String,
    pub title: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Browser version info.
///
/// Note: Chrome returns PascalCase field names for this endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserVersion {
    #[serde(rename = "Browser")]
    pub browser: String,
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,
    #[serde(rename = "User-Agent")]
    pub user_agent: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub web_socket_debugger_url: String,
}

// ============================================================================
// Runtime Types
// ============================================================================

/// Remote object from Runtime domain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteObject {
    #[serde(rename = "type")]
    pub object_type: String,
    pub subtype: Option<String>,
    pub value: Option<Value>,
    pub description: Option<String>,
    pub object_id: Option<String>,
}

/// Exception details from Runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub text: String,
    #[serde(default)]
    pub line_number: i64,
    #[serde(default)]
    pub column_number: i64,
    pub exception: Option<RemoteObject>,
}

impl ExceptionDetails {
    /// Most specific message available: the thrown object's description, then the text.
    pub fn message(&self) -> String {
        self.exception
            .as_ref()
            .and_then(|e| e.description.clone())
            .unwrap_or_else(|| self.text.clone())
    }
}

/// Execution context description from `Runtime.executionContextCreated`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContextDescription {
    pub id: i64,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub aux_data: Option<Value>,
}

impl ExecutionContextDescription {
    /// Whether this is the default (page world) context of a frame.
    pub fn is_default(&self) -> bool {
        self.aux_data
            .as_ref()
            .and_then(|aux| aux["isDefault"].as_bool())
            .unwrap_or(false)
    }

    pub fn frame_id(&self) -> Option<String> {
        self.aux_data
            .as_ref()
            .and_then(|aux| aux["frameId"].as_str())
            .map(str::to_string)
    }
}

// ============================================================================
// Page Events
// ============================================================================

/// Page-level events the bridge reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// A new execution context exists (fires on every navigation/reload).
    ContextCreated {
        context_id: i64,
        frame_id: Option<String>,
        is_default: bool,
    },
    /// A frame committed a navigation.
    FrameNavigated {
        frame_id: String,
        url: String,
        is_main: bool,
    },
    /// A response for a document resource arrived.
    DocumentResponse { request_id: String, url: String },
    /// A request was paused by the Fetch domain.
    RequestPaused {
        request_id: String,
        url: String,
        resource_type: String,
    },
}

impl PageEvent {
    /// Parse a CDP event; unknown events yield `None`.
    pub fn from_cdp(method: &str, params: &Value) -> Option<Self> {
        match method {
            "Runtime.executionContextCreated" => {
                let ctx: ExecutionContextDescription =
                    serde_json::from_value(params["context"].clone()).ok()?;
                Some(PageEvent::ContextCreated {
                    context_id: ctx.id,
                    frame_id: ctx.frame_id(),
                    is_default: ctx.is_default(),
                })
            }
            "Page.frameNavigated" => {
                let frame = &params["frame"];
                Some(PageEvent::FrameNavigated {
                    frame_id: frame["id"].as_str()?.to_string(),
                    url: frame["url"].as_str().unwrap_or_default().to_string(),
                    is_main: frame.get("parentId").is_none(),
                })
            }
            "Network.responseReceived" if params["type"] == "Document" => {
                Some(PageEvent::DocumentResponse {
                    request_id: params["requestId"].as_str()?.to_string(),
                    url: params["response"]["url"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string(),
                })
            }
            "Fetch.requestPaused" => Some(PageEvent::RequestPaused {
                request_id: params["requestId"].as_str()?.to_string(),
                url: params["request"]["url"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
                resource_type: params["resourceType"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            }),
            _ => None,
        }
    }

    /// Whether this event means the page world of `main_frame` was replaced.
    ///
    /// Child frames get default contexts too; they only count when the main
    /// frame id or the context's frame id is unknown.
    pub fn is_main_context_created(&self, main_frame: Option<&str>) -> bool {
        match self {
            PageEvent::ContextCreated {
                is_default: true,
                frame_id,
                ..
            } => match (frame_id.as_deref(), main_frame) {
                (Some(frame), Some(main)) => frame == main,
                _ => true,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
