pub mod config;
pub mod extract;
pub mod fetcher;
pub mod price;
pub mod provider;
pub mod retailers;

#[cfg(feature = "browser")]
pub mod browser_fetcher;

#[cfg(feature = "browser")]
pub use browser_fetcher::BrowserPageFetcher;
pub use config::Settings;
pub use fetcher::{HttpPageFetcher, PageFetcher, PageRequest};
pub use provider::{RetailProvider, retail_providers, select_providers};
pub use retailers::{RETAILERS, Retailer};
