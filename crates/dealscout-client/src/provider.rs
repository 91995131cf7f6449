use std::time::Duration;

use dealscout_core::{
    AnyProvider, Provider, ProviderError, ProviderInfo, ProviderRequest, RawListing, Stage,
};
use url::Url;

use crate::extract::{self, ProductPaths};
use crate::fetcher::{PageFetcher, PageRequest};
use crate::retailers::{RETAILERS, Retailer};

/// Extra time given to a page whose first read had no products.
const REREAD_DELAY: Duration = Duration::from_millis(1400);

/// A retailer searched through a page fetcher.
#[derive(Debug, Clone)]
pub struct RetailProvider<F> {
    retailer: &'static Retailer,
    info: ProviderInfo,
    base_url: Url,
    paths: ProductPaths,
    fetcher: F,
}

impl<F: PageFetcher> RetailProvider<F> {
    pub fn new(retailer: &'static Retailer, fetcher: F) -> Result<Self, ProviderError> {
        let base_url = Url::parse(retailer.base_url).map_err(|e| {
            ProviderError::Parse(format!("bad base URL for {}: {e}", retailer.id))
        })?;
        let paths = ProductPaths::new(retailer.product_paths).map_err(|e| {
            ProviderError::Parse(format!("bad product pattern for {}: {e}", retailer.id))
        })?;
        Ok(Self {
            retailer,
            info: retailer.info(),
            base_url,
            paths,
            fetcher,
        })
    }

    pub fn retailer(&self) -> &'static Retailer {
        self.retailer
    }
}

impl<F: PageFetcher> Provider for RetailProvider<F> {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn search(&self, request: ProviderRequest) -> Result<Vec<RawListing>, ProviderError> {
        let query = &request.query;
        let url = self
            .retailer
            .search_url_for(query.text(), query.include_auctions());
        let settle = self
            .retailer
            .settle_ms
            .map_or(query.settle_delay(), Duration::from_millis);

        request.progress.report(Stage::Navigating);
        tracing::debug!(provider = self.retailer.id, %url, "Fetching search page");
        let page = PageRequest {
            url: &url,
            wait_for_selector: self.retailer.wait_for_selector,
            nav_timeout: query.nav_timeout(),
            selector_timeout: query.selector_timeout(),
            settle,
        };
        let html = self.fetcher.fetch(&page).await?;

        request.progress.report(Stage::Parsing);
        let mut candidates = extract::extract_candidates(&html, &self.retailer.strategy)?;
        if candidates.is_empty() {
            tracing::debug!(provider = self.retailer.id, "No candidates on first read, reading again");
            let html = self.fetcher.reread(&page, REREAD_DELAY).await?;
            candidates = extract::extract_candidates(&html, &self.retailer.strategy)?;
        }
        let found = candidates.len();
        let listings = extract::coerce(
            candidates,
            &self.base_url,
            &self.paths,
            query.tokens(),
            query.include_auctions(),
            request.max_items,
        );
        tracing::debug!(
            provider = self.retailer.id,
            candidates = found,
            kept = listings.len(),
            "Parsed search page"
        );
        Ok(listings)
    }
}

/// One provider per registered retailer, all sharing `fetcher`.
pub fn retail_providers<F: PageFetcher>(fetcher: F) -> Result<Vec<RetailProvider<F>>, ProviderError> {
    RETAILERS
        .iter()
        .map(|r| RetailProvider::new(r, fetcher.clone()))
        .collect()
}

/// Type-erased providers for the given retailer ids (all when empty).
pub fn select_providers<F: PageFetcher>(
    fetcher: F,
    ids: &[String],
) -> Result<Vec<AnyProvider>, ProviderError> {
    let providers = retail_providers(fetcher)?;
    Ok(providers
        .into_iter()
        .filter(|p| ids.is_empty() || ids.iter().any(|id| id.eq_ignore_ascii_case(p.retailer.id)))
        .map(AnyProvider::new)
        .collect())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use dealscout_core::testutil::test_config;
    use dealscout_core::{ItemKind, Query, QueryOptions, SearchEngine, TaskState};

    use super::*;
    use crate::retailers;

    /// Serves canned HTML and records requested URLs.
    #[derive(Clone, Default)]
    struct StaticFetcher {
        html: Arc<String>,
        status: Option<u16>,
        requested: Arc<Mutex<Vec<String>>>,
    }

    impl StaticFetcher {
        fn serving(html: &str) -> Self {
            Self {
                html: Arc::new(html.to_string()),
                ..Self::default()
            }
        }
    }

    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, request: &PageRequest<'_>) -> Result<String, ProviderError> {
            self.requested.lock().unwrap().push(request.url.to_string());
            match self.status {
                Some(status) => Err(ProviderError::from_status(status, request.url)),
                None => Ok(self.html.to_string()),
            }
        }
    }

    /// Serves each page in turn, repeating the last one.
    #[derive(Clone)]
    struct SequenceFetcher {
        pages: Arc<Vec<&'static str>>,
        calls: Arc<Mutex<Vec<tokio::time::Instant>>>,
    }

    impl PageFetcher for SequenceFetcher {
        async fn fetch(&self, _: &PageRequest<'_>) -> Result<String, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(tokio::time::Instant::now());
            let index = (calls.len() - 1).min(self.pages.len() - 1);
            Ok(self.pages[index].to_string())
        }
    }

    const BESTBUY_PAGE: &str = r#"
        <ul>
          <li class="sku-item">
            <h4 class="sku-title"><a href="/site/sony-playstation-5-console/6523167.p">Sony PlayStation 5 Console</a></h4>
            <div class="priceView-hero-price"><span>$499.99</span></div>
          </li>
          <li class="sku-item">
            <h4 class="sku-title"><a href="/site/ps5-dualsense-controller/6430163.p">PS5 DualSense Controller</a></h4>
            <div class="priceView-hero-price"><span>$69.99</span></div>
          </li>
          <li class="sku-item">
            <h4 class="sku-title"><a href="/site/xbox-series-x/6428324.p">Xbox Series X</a></h4>
            <div class="priceView-hero-price"><span>$499.99</span></div>
          </li>
        </ul>
    "#;

    fn request(text: &str) -> ProviderRequest {
        let query = Query::new(text, QueryOptions::default(), &test_config()).unwrap();
        ProviderRequest {
            max_items: query.max_items(),
            budget: query.task_budget(),
            query: Arc::new(query),
            progress: dealscout_core::task::ProgressReporter::detached("bestbuy"),
        }
    }

    #[tokio::test]
    async fn extracts_relevant_listings() {
        let fetcher = StaticFetcher::serving(BESTBUY_PAGE);
        let provider =
            RetailProvider::new(retailers::find("bestbuy").unwrap(), fetcher.clone()).unwrap();

        let listings = provider.search(request("ps5 console")).await.unwrap();
        let titles: Vec<_> = listings.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Sony PlayStation 5 Console", "PS5 DualSense Controller"]
        );
        assert_eq!(
            listings[1].url,
            "https://www.bestbuy.com/site/ps5-dualsense-controller/6430163.p"
        );
        assert_eq!(
            *fetcher.requested.lock().unwrap(),
            vec!["https://www.bestbuy.com/site/searchpage.jsp?st=ps5+console"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_first_read_is_read_again_after_a_delay() {
        let fetcher = SequenceFetcher {
            pages: Arc::new(vec!["<html><body>Loading...</body></html>", BESTBUY_PAGE]),
            calls: Arc::default(),
        };
        let provider =
            RetailProvider::new(retailers::find("bestbuy").unwrap(), fetcher.clone()).unwrap();

        let listings = provider.search(request("ps5 console")).await.unwrap();
        assert_eq!(listings.len(), 2);

        let calls = fetcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1] - calls[0], REREAD_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn page_with_products_is_read_once() {
        let fetcher = SequenceFetcher {
            pages: Arc::new(vec![BESTBUY_PAGE]),
            calls: Arc::default(),
        };
        let provider =
            RetailProvider::new(retailers::find("bestbuy").unwrap(), fetcher.clone()).unwrap();

        provider.search(request("ps5 console")).await.unwrap();
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blocked_status_is_reported() {
        let fetcher = StaticFetcher {
            status: Some(429),
            ..StaticFetcher::default()
        };
        let provider = RetailProvider::new(retailers::find("walmart").unwrap(), fetcher).unwrap();
        let err = provider.search(request("ps5")).await.unwrap_err();
        assert_eq!(err.kind(), "blocked");
    }

    #[tokio::test]
    async fn retail_providers_run_through_the_engine() {
        let fetcher = StaticFetcher::serving(BESTBUY_PAGE);
        let providers = select_providers(fetcher, &["bestbuy".to_string()]).unwrap();
        assert_eq!(providers.len(), 1);

        let outcome = SearchEngine::new(providers, test_config())
            .search("playstation", QueryOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.summary.providers[0].status, TaskState::Succeeded);
        assert_eq!(outcome.results.listings.len(), 1);
        assert_eq!(outcome.results.listings[0].kind, ItemKind::Console);
        assert_eq!(outcome.results.listings[0].source, "Best Buy");
    }

    #[test]
    fn builds_every_retailer() {
        let providers = retail_providers(StaticFetcher::default()).unwrap();
        assert_eq!(providers.len(), RETAILERS.len());
    }
}
