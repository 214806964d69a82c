//! Core session struct, CDP command dispatch and the page event pump.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::client::{COMMAND_TIMEOUT, Commander};
use crate::error::CdpError;
use crate::protocol::{CdpResponse, PageEvent};

/// Capacity of the per-page event fan-out.
const EVENT_CAPACITY: usize = 256;

/// A session attached to a single page/target.
pub struct PageSession {
    /// Target ID.
    pub(super) target_id: String,
    /// Session ID for this target.
    pub(super) session_id: String,
    /// Command channel (shared with client).
    pub(super) commander: Commander,
    /// Fan-out of parsed page events.
    pub(super) events: broadcast::Sender<PageEvent>,
    /// Request ID of the most recent main document response.
    pub(super) last_document: Arc<Mutex<Option<String>>>,
    /// Frame ID of the top-level frame.
    pub(super) main_frame: Arc<Mutex<Option<String>>>,
    /// Event pump plus any interception tasks; aborted on drop.
    pub(super) tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PageSession {
    /// Create a new page session.
    pub(crate) fn new(
        target_id: String,
        session_id: String,
        commander: Commander,
        event_rx: mpsc::UnboundedReceiver<CdpResponse>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let last_document = Arc::new(Mutex::new(None));
        let main_frame = Arc::new(Mutex::new(None));

        let pump = tokio::spawn(Self::pump_events(
            event_rx,
            events.clone(),
            last_document.clone(),
            main_frame.clone(),
        ));

        Self {
            target_id,
            session_id,
            commander,
            events,
            last_document,
            main_frame,
            tasks: Mutex::new(vec![pump]),
        }
    }

    async fn pump_events(
        mut event_rx: mpsc::UnboundedReceiver<CdpResponse>,
        events: broadcast::Sender<PageEvent>,
        last_document: Arc<Mutex<Option<String>>>,
        main_frame: Arc<Mutex<Option<String>>>,
    ) {
        while let Some(resp) = event_rx.recv().await {
            let Some(method) = resp.method.as_deref() else {
                continue;
            };
            let params = resp.params.unwrap_or(Value::Null);
            let Some(event) = PageEvent::from_cdp(method, &params) else {
                continue;
            };
            trace!("page event: {:?}", event);

            match &event {
                PageEvent::DocumentResponse { request_id, .. } => {
                    *last_document.lock() = Some(request_id.clone());
                }
                // Updated before the frame's context event is forwarded.
                PageEvent::FrameNavigated {
                    frame_id,
                    is_main: true,
                    ..
                } => {
                    *main_frame.lock() = Some(frame_id.clone());
                }
                _ => {}
            }
            // No subscribers is fine.
            let _ = events.send(event);
        }
        debug!("page event stream ended");
    }

    /// Get target ID.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Get session ID.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Frame ID of the top-level frame, once known.
    pub fn main_frame_id(&self) -> Option<String> {
        self.main_frame.lock().clone()
    }

    /// Subscribe to page events. Only events sent after this call are observed.
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// Send a CDP command to this page session.
    pub async fn call(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.call_with_timeout(method, params, COMMAND_TIMEOUT).await
    }

    /// Send a CDP command with an explicit response timeout.
    pub async fn call_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, CdpError> {
        self.commander
            .send(method, params, Some(&self.session_id), timeout)
            .await
    }

    /// Enable required CDP domains.
    pub(crate) async fn enable_domains(&self) -> Result<(), CdpError> {
        self.call("Page.enable", None).await?;
        let tree = self.call("Page.getFrameTree", None).await?;
        if let Some(frame_id) = main_frame_of(&tree) {
            self.main_frame.lock().get_or_insert(frame_id);
        }
        self.call("Runtime.enable", None).await?;
        self.call("Network.enable", None).await?;

        debug!("Enabled CDP domains for session {}", self.session_id);
        Ok(())
    }

    pub(super) fn track(&self, task: JoinHandle<()>) {
        self.tasks.lock().push(task);
    }
}

/// Top-level frame ID from a `Page.getFrameTree` result.
pub(super) fn main_frame_of(tree: &Value) -> Option<String> {
    tree["frameTree"]["frame"]["id"].as_str().map(str::to_string)
}

impl Drop for PageSession {
    fn drop(&mut self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
