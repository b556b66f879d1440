use crate::config::BrowserSettings;
use crate::models::{SelectorCandidate, SelectorKind};
use crate::scrapers::traits::PageRenderer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Page renderer backed by a single headless Chrome tab.
///
/// CDP calls block, so each one runs on tokio's blocking pool.
pub struct ChromeRenderer {
    // Owns the Chrome process; the tab dies with it
    _browser: Browser,
    tab: Arc<Tab>,
    page_settle: Duration,
}

impl ChromeRenderer {
    /// Launch Chrome and open the tab used for every target
    pub fn launch(settings: &BrowserSettings) -> Result<Self> {
        info!("Launching headless Chrome (headless={})...", settings.headless);

        let options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .sandbox(false)
            .args(vec![OsStr::new("--disable-dev-shm-usage")])
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        let tab = browser.new_tab().context("Failed to open browser tab")?;
        tab.set_default_timeout(settings.navigation_timeout);
        tab.set_user_agent(&settings.user_agent, None, None)
            .context("Failed to set user agent")?;

        Ok(Self {
            _browser: browser,
            tab,
            page_settle: settings.page_settle,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromeRenderer {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);

        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&target)?;
            tab.wait_until_navigated()?;
            Ok(())
        })
        .await
        .context("Browser task panicked")?
        .with_context(|| format!("Failed to load {url}"))?;

        // Give client-side rendering a head start before polling for selectors
        tokio::time::sleep(self.page_settle).await;
        Ok(())
    }

    async fn visible_text(
        &self,
        candidate: &SelectorCandidate,
        timeout: Duration,
    ) -> Result<Option<String>> {
        let tab = Arc::clone(&self.tab);
        let candidate = candidate.clone();

        tokio::task::spawn_blocking(move || -> Result<Option<String>> {
            let found = match candidate.kind {
                SelectorKind::Css => {
                    tab.wait_for_element_with_custom_timeout(&candidate.selector, timeout)
                }
                SelectorKind::XPath => {
                    tab.wait_for_xpath_with_custom_timeout(&candidate.selector, timeout)
                }
            };

            let element = match found {
                Ok(element) => element,
                Err(e) => {
                    debug!("No element for '{}': {}", candidate.selector, e);
                    return Ok(None);
                }
            };

            // Lazy pages only fill the price once it is on screen
            if let Err(e) = element.scroll_into_view() {
                debug!("Could not scroll '{}' into view: {}", candidate.selector, e);
            }

            let text = element
                .get_inner_text()
                .with_context(|| format!("Failed to read text of '{}'", candidate.selector))?;
            Ok(Some(text))
        })
        .await
        .context("Browser task panicked")?
    }

    fn renderer_name(&self) -> &'static str {
        "headless Chrome"
    }
}
