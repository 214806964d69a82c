//! CDP WebSocket client.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};

use crate::error::CdpError;
use crate::protocol::{BrowserVersion, CdpRequest, CdpResponse, PageInfo, TargetInfo};
use crate::session::PageSession;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;
type EventHandlers = Arc<RwLock<HashMap<String, mpsc::UnboundedSender<CdpResponse>>>>;

/// Default per-command timeout.
pub(crate) const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending request waiting for response.
pub(crate) struct PendingRequest {
    pub tx: oneshot::Sender<Result<Value, CdpError>>,
}

/// Command channel shared by the client and every page session.
///
/// Cheap to clone; background tasks hold their own copy.
#[derive(Clone)]
pub(crate) struct Commander {
    ws_tx: Arc<tokio::sync::Mutex<WsSink>>,
    request_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
}

impl Commander {
    /// Send a CDP command and wait for its response.
    pub(crate) async fn send(
        &self,
        method: &str,
        params: Option<Value>,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Value, CdpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = CdpRequest {
            id,
            method: method.to_string(),
            params,
            session_id: session_id.map(|s| s.to_string()),
        };

        let json = serde_json::to_string(&request)?;
        trace!("CDP send: {}", json);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, PendingRequest { tx });

        {
            let mut ws = self.ws_tx.lock().await;
            if let Err(e) = ws.send(Message::Text(json.into())).await {
                self.pending.lock().remove(&id);
                return Err(e.into());
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CdpError::SessionClosed),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(CdpError::Timeout(format!("Request {} timed out", method)))
            }
        }
    }
}

/// Complete the request a response answers. Returns the message back when it
/// is an event.
fn resolve_pending(
    pending: &Mutex<HashMap<u64, PendingRequest>>,
    resp: CdpResponse,
) -> Option<CdpResponse> {
    let Some(id) = resp.id else {
        return resp.method.is_some().then_some(resp);
    };
    let Some(req) = pending.lock().remove(&id) else {
        trace!("response for unknown request {}", id);
        return None;
    };
    let result = match resp.error {
        Some(error) => Err(CdpError::protocol(error.code, error.message)),
        None => Ok(resp.result.unwrap_or(Value::Null)),
    };
    let _ = req.tx.send(result);
    None
}

/// Fail everything still in flight so callers do not wait out their timeouts.
fn fail_pending(pending: &Mutex<HashMap<u64, PendingRequest>>) {
    for (_, req) in pending.lock().drain() {
        let _ = req.tx.send(Err(CdpError::SessionClosed));
    }
}

/// CDP client for browser automation.
///
/// Connects to Chrome via WebSocket and provides methods for browser control.
pub struct CdpClient {
    /// HTTP endpoint for page discovery.
    http_endpoint: String,
    /// Browser WebSocket URL.
    browser_ws_url: String,
    /// Browser product string from `/json/version`.
    browser: String,
    commander: Commander,
    /// Event handlers by session ID.
    event_handlers: EventHandlers,
    /// Background task handle.
    recv_task: tokio::task::JoinHandle<()>,
}

impl CdpClient {
    /// Connect to Chrome at the given endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Chrome debugging endpoint (e.g., "http://localhost:9222")
    pub async fn connect(endpoint: &str) -> Result<Self, CdpError> {
        let http_endpoint = endpoint.trim_end_matches('/').to_string();
        url::Url::parse(&http_endpoint)?;

        let version = Self::probe(&http_endpoint).await?;
        debug!("Connected to browser: {}", version.browser);

        let browser_ws_url = version.web_socket_debugger_url;

        let (ws_stream, _) = tokio_tungstenite::connect_async(&browser_ws_url)
            .await
            .map_err(|e| CdpError::ConnectionFailed(format!("WebSocket: {}", e)))?;

        let (ws_sink, ws_source) = ws_stream.split();
        let commander = Commander {
            ws_tx: Arc::new(tokio::sync::Mutex::new(ws_sink)),
            request_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
        };
        let event_handlers: EventHandlers = Arc::new(RwLock::new(HashMap::new()));

        let recv_task = {
            let pending = commander.pending.clone();
            let event_handlers = event_handlers.clone();
            tokio::spawn(async move {
                Self::receive_loop(ws_source, pending, event_handlers).await;
            })
        };

        debug!("CDP client connected to {}", browser_ws_url);

        Ok(Self {
            http_endpoint,
            browser_ws_url,
            browser: version.browser,
            commander,
            event_handlers,
            recv_task,
        })
    }

    /// Fetch `/json/version` from a DevTools HTTP endpoint.
    pub async fn probe(endpoint: &str) -> Result<BrowserVersion, CdpError> {
        let version_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
        debug!("Fetching browser version from {}", version_url);

        reqwest::get(&version_url)
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))?
            .json()
            .await
            .map_err(|e| CdpError::ChromeNotAvailable(format!("{}: {}", endpoint, e)))
    }

    /// WebSocket receive loop.
    async fn receive_loop(
        mut ws_source: WsSource,
        pending: Arc<Mutex<HashMap<u64, PendingRequest>>>,
        event_handlers: EventHandlers,
    ) {
        while let Some(msg) = ws_source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    trace!("CDP recv: {}", text);
                    match serde_json::from_str::<CdpResponse>(&text) {
                        Ok(resp) => {
                            let Some(event) = resolve_pending(&pending, resp) else {
                                continue;
                            };
                            let session_id = event.session_id.clone().unwrap_or_default();
                            let handlers = event_handlers.read().await;
                            if let Some(tx) = handlers.get(&session_id) {
                                let _ = tx.send(event);
                            }
                        }
                        Err(e) => {
                            warn!("Failed to parse CDP message: {}", e);
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    error!("WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }

        fail_pending(&pending);
    }

    /// Send a browser-level CDP command and wait for response.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.commander.send(method, params, None, COMMAND_TIMEOUT).await
    }

    /// Get browser WebSocket URL.
    pub fn browser_ws_url(&self) -> &str {
        &self.browser_ws_url
    }

    /// Browser product string, e.g. `Chrome/126.0.6478.126`.
    pub fn browser(&self) -> &str {
        &self.browser
    }

    // ========================================================================
    // Target Management
    // ========================================================================

    /// List all pages.
    pub async fn list_pages(&self) -> Result<Vec<PageInfo>, CdpError> {
        let url = format!("{}/json/list", self.http_endpoint);
        let pages: Vec<PageInfo> = reqwest::get(&url).await?.json().await?;
        Ok(pages)
    }

    /// Create a new page/tab.
    pub async fn new_page(&self, url: Option<&str>) -> Result<PageSession, CdpError> {
        let result = self
            .call(
                "Target.createTarget",
                Some(json!({ "url": url.unwrap_or("about:blank") })),
            )
            .await?;

        let target_id = result["targetId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing targetId".to_string()))?
            .to_string();
        debug!("Created new page: {}", target_id);

        self.attach_page(&target_id).await
    }

    /// Attach to an existing page.
    pub async fn attach_page(&self, target_id: &str) -> Result<PageSession, CdpError> {
        let result = self
            .call(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true
                })),
            )
            .await?;

        let session_id = result["sessionId"]
            .as_str()
            .ok_or_else(|| CdpError::InvalidResponse("Missing sessionId".to_string()))?
            .to_string();

        // Register before enabling domains so the first context events are not lost.
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.event_handlers
            .write()
            .await
            .insert(session_id.clone(), event_tx);

        let session = PageSession::new(
            target_id.to_string(),
            session_id,
            self.commander.clone(),
            event_rx,
        );

        session.enable_domains().await?;

        Ok(session)
    }

    /// Attach to the first open page whose URL starts with `prefix`, if any.
    pub async fn attach_matching(&self, prefix: &str) -> Result<Option<PageSession>, CdpError> {
        let targets = self.get_targets().await?;
        match targets
            .into_iter()
            .find(|t| t.target_type == "page" && t.url.starts_with(prefix))
        {
            Some(target) => Ok(Some(self.attach_page(&target.target_id).await?)),
            None => Ok(None),
        }
    }

    /// Get all targets.
    pub async fn get_targets(&self) -> Result<Vec<TargetInfo>, CdpError> {
        let result = self.call("Target.getTargets", None).await?;
        let targets: Vec<TargetInfo> = serde_json::from_value(result["targetInfos"].clone())?;
        Ok(targets)
    }

    /// Close a page/target.
    pub async fn close_page(&self, target_id: &str) -> Result<(), CdpError> {
        self.call("Target.closeTarget", Some(json!({"targetId": target_id})))
            .await?;
        Ok(())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
