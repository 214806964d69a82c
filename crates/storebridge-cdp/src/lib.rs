//! Chrome DevTools Protocol (CDP) client for storebridge.
//!
//! Connects to Chrome/Chromium over WebSocket and exposes the page-level
//! primitives the bridging layer consumes: evaluation, self-resuming
//! condition waits, execution-context lifecycle events, script injection
//! and main-document interception.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    WebSocket     ┌──────────────────┐
//! │   storebridge   │ ◄──────────────► │   Chrome/Edge    │
//! │  (this crate)   │       CDP        │   (target page)  │
//! └─────────────────┘                  └──────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = CdpClient::connect("http://localhost:9222").await?;
//! let page = client.new_page(None).await?;
//! page.navigate("https://example.com").await?;
//! ```

mod client;
mod error;
mod launcher;
mod protocol;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use launcher::{ChromeLauncher, LaunchOptions};
pub use protocol::*;
pub use session::PageSession;
