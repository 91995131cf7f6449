use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use dealscout_core::ProviderError;
use futures::StreamExt;

use crate::fetcher::{CloseOnDrop, DESKTOP_USER_AGENT, PageFetcher, PageRequest};

const SELECTOR_POLL: Duration = Duration::from_millis(250);

/// Headless-browser fetcher using Chromium via the Chrome DevTools Protocol.
///
/// Unlike [`super::HttpPageFetcher`], this renders JavaScript before reading
/// the DOM, which most retailer result pages need.
///
/// A single Chromium process is shared across all clones; each fetch opens a
/// tab, navigates, waits for the retailer's selector, lets the page settle,
/// reads the DOM and closes the tab.
#[derive(Clone)]
pub struct BrowserPageFetcher {
    browser: Arc<Browser>,
}

impl BrowserPageFetcher {
    /// Requires a Chromium / Chrome binary reachable via `$PATH` (or
    /// `CHROME_BIN`).
    pub async fn launch(headless: bool) -> Result<Self, ProviderError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .window_size(1400, 900);

        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!(binary = %bin.display(), "Using Chrome binary");
            builder = builder.chrome_executable(bin);
        }
        if headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }

        let config = builder
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--lang=en-US")
            .arg(format!("--user-agent={DESKTOP_USER_AGENT}"))
            .build()
            .map_err(|e| ProviderError::Network(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Snap-packaged Chromium wraps the real binary and strips headless
    /// flags, so look for the real one first.
    fn find_chrome_binary() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(p);
            if path.exists() {
                return Some(path);
            }
        }

        [
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
    }

    async fn load(&self, page: &Page, request: &PageRequest<'_>) -> Result<String, ProviderError> {
        let navigate = page.goto(NavigateParams::new(request.url));
        match tokio::time::timeout(request.nav_timeout, navigate).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(ProviderError::Network(format!(
                    "Failed to navigate to {}: {e}",
                    request.url
                )));
            }
            Err(_) => {
                return Err(ProviderError::Network(format!(
                    "Navigation timed out after {} ms",
                    request.nav_timeout.as_millis()
                )));
            }
        }

        if let Some(selector) = request.wait_for_selector {
            let found = tokio::time::timeout(request.selector_timeout, async {
                while page.find_element(selector).await.is_err() {
                    tokio::time::sleep(SELECTOR_POLL).await;
                }
            })
            .await;
            if found.is_err() {
                tracing::debug!(url = request.url, %selector, "Selector did not appear, reading page anyway");
            }
        }

        tokio::time::sleep(request.settle).await;

        page.content()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to read page content: {e}")))
    }
}

impl PageFetcher for BrowserPageFetcher {
    async fn fetch(&self, request: &PageRequest<'_>) -> Result<String, ProviderError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to open tab: {e}")))?;

        // The tab is closed even if this future is dropped mid-load.
        let tab = CloseOnDrop::new(page.clone(), |page: Page| async move {
            let _ = page.close().await;
        });
        let result = self.load(&page, request).await;
        tab.close().await;
        result
    }

    /// The extra wait happens inside the tab, after the selector wait.
    async fn reread(
        &self,
        request: &PageRequest<'_>,
        delay: Duration,
    ) -> Result<String, ProviderError> {
        let request = PageRequest {
            settle: request.settle + delay,
            ..request.clone()
        };
        self.fetch(&request).await
    }
}
