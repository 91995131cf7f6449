/// Smoke-test for `BrowserPageFetcher`.
///
/// Launches a headless Chromium, loads one retailer search page through the
/// real provider pipeline and prints what was extracted.
///
/// Run with:
///   cargo run -p dealscout-client --example browser_smoke --features browser -- bestbuy "ps5"
use std::sync::Arc;

use anyhow::Context;
use dealscout_client::{BrowserPageFetcher, RetailProvider, Settings, retailers};
use dealscout_core::task::ProgressReporter;
use dealscout_core::{Provider, ProviderRequest, Query, QueryOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("dealscout=debug,info").init();

    let mut args = std::env::args().skip(1);
    let id = args.next().unwrap_or_else(|| "bestbuy".to_string());
    let text = args.next().unwrap_or_else(|| "ps5".to_string());

    let settings = Settings::from_env();
    let retailer = retailers::find(&id).with_context(|| format!("unknown retailer '{id}'"))?;

    println!("Launching headless browser…");
    let fetcher = BrowserPageFetcher::launch(settings.headless).await?;
    let provider = RetailProvider::new(retailer, fetcher)?;

    let query = Query::new(&text, QueryOptions::default(), &settings.session_config())?;
    let request = ProviderRequest {
        max_items: query.max_items(),
        budget: query.task_budget(),
        query: Arc::new(query),
        progress: ProgressReporter::detached(retailer.id),
    };

    let listings = provider.search(request).await?;
    println!("{} listings from {}", listings.len(), retailer.name);
    for listing in &listings {
        let price = listing
            .price
            .map_or_else(|| "n/a".to_string(), |p| format!("${p:.2}"));
        println!("{price:>10}  {}  {}", listing.title, listing.url);
    }
    Ok(())
}
