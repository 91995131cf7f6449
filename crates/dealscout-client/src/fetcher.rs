use std::future::Future;
use std::time::Duration;

use dealscout_core::ProviderError;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// One page load.
#[derive(Debug, Clone)]
pub struct PageRequest<'a> {
    pub url: &'a str,
    /// Element to wait for after navigation; a miss is not an error.
    pub wait_for_selector: Option<&'a str>,
    pub nav_timeout: Duration,
    pub selector_timeout: Duration,
    /// Extra time for late-rendering content.
    pub settle: Duration,
}

/// Retrieves the HTML of a search results page.
pub trait PageFetcher: Send + Sync + Clone + 'static {
    fn fetch(
        &self,
        request: &PageRequest<'_>,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Fetch again after a page yielded nothing. Late-rendering pages
    /// get `delay` more time before they are read.
    fn reread(
        &self,
        request: &PageRequest<'_>,
        delay: Duration,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        async move {
            tokio::time::sleep(delay).await;
            self.fetch(request).await
        }
    }
}

/// Runs an async close on a resource when dropped, including when the
/// owning future is aborted mid-await.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) struct CloseOnDrop<T, F, Fut>
where
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    inner: Option<(T, F)>,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
impl<T, F, Fut> CloseOnDrop<T, F, Fut>
where
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub(crate) fn new(resource: T, close: F) -> Self {
        Self {
            inner: Some((resource, close)),
        }
    }

    /// Close in place and wait for it.
    pub(crate) async fn close(mut self) {
        if let Some((resource, close)) = self.inner.take() {
            close(resource).await;
        }
    }
}

impl<T, F, Fut> Drop for CloseOnDrop<T, F, Fut>
where
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn drop(&mut self) {
        let Some((resource, close)) = self.inner.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(close(resource));
            }
            Err(_) => tracing::debug!("No runtime to close resource on drop"),
        }
    }
}

/// Plain HTTP fetcher using reqwest. Does not run JavaScript.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = Client::builder()
            .user_agent(DESKTOP_USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, request: &PageRequest<'_>) -> Result<String, ProviderError> {
        let url = request.url;
        let response = self
            .client
            .get(url)
            .timeout(request.nav_timeout)
            .send()
            .await
            .map_err(|e| classify(&e, request.nav_timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::from_status(status.as_u16(), url));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("Failed to read response body: {e}")))
    }
}

fn classify(e: &reqwest::Error, timeout: Duration) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Network(format!(
            "Navigation timed out after {} ms",
            timeout.as_millis()
        ))
    } else if e.is_connect() {
        ProviderError::Network(format!("Connection failed: {e}"))
    } else {
        ProviderError::Network(e.to_string())
    }
}
