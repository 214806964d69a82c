//! End-to-end bootstrap: browser, version pin, navigation and binding.

use std::sync::Arc;
use std::time::Duration;

use storebridge_cdp::{CdpClient, ChromeLauncher, LaunchOptions, PageSession};
use storebridge_config::{Config, ConfigValidator};
use tracing::{info, warn};

use crate::cdp_page::CdpPage;
use crate::error::BridgeError;
use crate::page::PageContext;
use crate::pin::{PinOutcome, VersionPin};
use crate::presence::{self, PresenceRecord};
use crate::session::{InjectionSession, SessionOptions};
use crate::store::StoreFacade;

/// A bound target page and everything keeping it alive.
pub struct Bridge {
    session: Arc<InjectionSession>,
    pin: VersionPin,
    outcome: PinOutcome,
    client: CdpClient,
    target_id: String,
    owns_page: bool,
    launcher: Option<ChromeLauncher>,
}

impl Bridge {
    /// Attach to (or launch) the browser, load the target and bind the facade.
    pub async fn start(config: &Config) -> Result<Self, BridgeError> {
        let warnings = ConfigValidator::validate(config)
            .and_then(|result| result.into_result())
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        for warning in warnings {
            warn!("config {}: {}", warning.path, warning.message);
        }

        let pin = VersionPin::from_config(&config.version_cache)?;
        let (endpoint, launcher) = Self::browser(config).await?;
        let client = CdpClient::connect(&endpoint).await?;
        info!("connected to {} at {}", client.browser(), endpoint);

        let web_url = config.browser.web_url.as_str();
        let (session, owns_page) = match client.attach_matching(web_url).await? {
            Some(session) => (session, false),
            None => (client.new_page(None).await?, true),
        };
        let target_id = session.target_id().to_string();
        Self::configure(&session, config).await?;

        let page = Arc::new(CdpPage::new(
            session,
            Duration::from_millis(config.session.poll_interval_ms),
        ));
        let outcome = pin.prepare(page.as_ref(), web_url).await?;

        let session = Arc::new(InjectionSession::new(
            Arc::clone(&page) as Arc<dyn PageContext>,
            SessionOptions::from(&config.session),
        ));
        session.listen();

        page.session().navigate(web_url).await?;
        let facade = session.bind().await?;
        info!(
            "bound {} keys ({} registry, version {})",
            facade.keys().len(),
            facade.generation(),
            facade.version().unwrap_or("unknown")
        );

        if let Err(e) = pin.capture(page.as_ref(), &outcome, facade.version()).await {
            warn!("snapshot capture failed: {}", e);
        }

        Ok(Self {
            session,
            pin,
            outcome,
            client,
            target_id,
            owns_page,
            launcher,
        })
    }

    async fn browser(config: &Config) -> Result<(String, Option<ChromeLauncher>), BridgeError> {
        let endpoint = config.browser.endpoint();
        if CdpClient::probe(&endpoint).await.is_ok() {
            return Ok((endpoint, None));
        }
        if !config.browser.launch {
            return Err(storebridge_cdp::CdpError::ChromeNotAvailable(endpoint).into());
        }

        let launcher = ChromeLauncher::launch(&LaunchOptions {
            debug_port: config.browser.debug_port,
            profile_dir: config.browser.profile_dir(),
            headless: config.browser.headless,
            executable: config.browser.executable(),
        })
        .await?;
        Ok((launcher.endpoint().to_string(), Some(launcher)))
    }

    async fn configure(session: &PageSession, config: &Config) -> Result<(), BridgeError> {
        if let Some(user_agent) = &config.browser.user_agent {
            session.set_user_agent(user_agent).await?;
        }
        if config.browser.bypass_csp {
            session.set_bypass_csp(true).await?;
        }
        Ok(())
    }

    pub fn session(&self) -> &Arc<InjectionSession> {
        &self.session
    }

    /// Current facade, rebinding first if the context was replaced.
    pub async fn facade(&self) -> Result<Arc<StoreFacade>, BridgeError> {
        self.session.bind().await
    }

    pub fn pin_outcome(&self) -> &PinOutcome {
        &self.outcome
    }

    pub fn pin(&self) -> &VersionPin {
        &self.pin
    }

    pub async fn subscribe_presence(&self, wid: &str) -> Result<bool, BridgeError> {
        let facade = self.facade().await?;
        Ok(presence::subscribe_presence(self.session.page(), &facade, wid).await)
    }

    pub async fn read_presence(&self, wid: &str) -> Result<Option<PresenceRecord>, BridgeError> {
        let facade = self.facade().await?;
        Ok(presence::read_presence(self.session.page(), &facade, wid).await)
    }

    /// Close the page and browser if this bridge opened them.
    pub async fn shutdown(self) -> Result<(), BridgeError> {
        if self.owns_page {
            if let Err(e) = self.client.close_page(&self.target_id).await {
                warn!("failed to close page: {}", e);
            }
        }
        if let Some(launcher) = self.launcher {
            launcher.shutdown().await?;
        }
        Ok(())
    }
}
