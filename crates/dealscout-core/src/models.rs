use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::AppError;
use crate::relevance::{self, Intent, ItemKind};

/// Result ordering requested by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    PriceLow,
    PriceHigh,
    EndingSoon,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::PriceLow => "price_low",
            SortOrder::PriceHigh => "price_high",
            SortOrder::EndingSoon => "ending_soon",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortOrder::Relevance),
            "price_low" => Ok(SortOrder::PriceLow),
            "price_high" => Ok(SortOrder::PriceHigh),
            "ending_soon" => Ok(SortOrder::EndingSoon),
            _ => Err(format!("Unknown sort order: {s}")),
        }
    }
}

/// Per-request knobs that travel with a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Overrides the configured per-provider item cap.
    pub max_items: Option<usize>,
    pub include_auctions: bool,
    pub sort: SortOrder,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_items: None,
            include_auctions: true,
            sort: SortOrder::Relevance,
        }
    }
}

impl QueryOptions {
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    pub fn without_auctions(mut self) -> Self {
        self.include_auctions = false;
        self
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }
}

/// An immutable, normalized search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    text: String,
    tokens: Vec<String>,
    intent: Intent,
    max_items: usize,
    include_auctions: bool,
    sort: SortOrder,
    settle_delay: Duration,
    nav_timeout: Duration,
    selector_timeout: Duration,
}

impl Query {
    /// Normalize `raw` and bind it to the session's timing budget.
    ///
    /// Whitespace runs collapse to one space and the text is truncated to
    /// `config.max_query_length` characters.
    pub fn new(raw: &str, options: QueryOptions, config: &SessionConfig) -> Result<Self, AppError> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let text: String = collapsed
            .chars()
            .take(config.max_query_length)
            .collect::<String>()
            .trim_end()
            .to_string();

        if text.is_empty() {
            return Err(AppError::InvalidQuery("query text is empty".into()));
        }

        let tokens = relevance::query_tokens(&text);
        let intent = relevance::query_intent(&tokens);
        let max_items = options
            .max_items
            .unwrap_or(config.max_items_per_provider)
            .max(1);

        Ok(Self {
            text,
            tokens,
            intent,
            max_items,
            include_auctions: options.include_auctions,
            sort: options.sort,
            settle_delay: config.settle_delay,
            nav_timeout: config.nav_timeout,
            selector_timeout: config.selector_timeout,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn include_auctions(&self) -> bool {
        self.include_auctions
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub fn nav_timeout(&self) -> Duration {
        self.nav_timeout
    }

    pub fn selector_timeout(&self) -> Duration {
        self.selector_timeout
    }

    /// Hard deadline for one provider call: navigation + selector wait + settle.
    pub fn task_budget(&self) -> Duration {
        self.nav_timeout + self.selector_timeout + self.settle_delay
    }
}

/// Static description of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Stable identifier, e.g. `"bestbuy"`.
    pub id: String,
    /// Display name, e.g. `"Best Buy"`.
    pub name: String,
    /// Tiebreak priority; higher ranks first.
    pub weight: u32,
}

impl ProviderInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, weight: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            weight,
        }
    }
}

/// A listing as a provider scraped it, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: String,
    pub price: Option<f64>,
    pub url: String,
    pub image_url: Option<String>,
    /// Provider-side classification; overrides title-based classification.
    pub kind: Option<ItemKind>,
    pub auction: bool,
    pub auction_end: Option<DateTime<Utc>>,
}

impl RawListing {
    pub fn new(title: impl Into<String>, price: Option<f64>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price,
            url: url.into(),
            image_url: None,
            kind: None,
            auction: false,
            auction_end: None,
        }
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn as_auction(mut self, ends_at: Option<DateTime<Utc>>) -> Self {
        self.auction = true;
        self.auction_end = ends_at;
        self
    }
}

/// One normalized deal, owned by the aggregator once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub provider_id: String,
    /// Display name of the provider.
    pub source: String,
    pub title: String,
    /// USD.
    pub price: Option<f64>,
    pub url: String,
    pub image_url: Option<String>,
    pub kind: ItemKind,
    pub auction: bool,
    pub auction_end: Option<DateTime<Utc>>,
    pub title_score: u32,
    pub provider_weight: u32,
}

/// Identity of "the same deal": normalized title, provider, whole-dollar price.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub title: String,
    pub provider_id: String,
    pub price_bucket: Option<i64>,
}

impl Listing {
    pub fn relevance_score(&self) -> u32 {
        self.title_score
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey {
            title: relevance::normalize_title(&self.title),
            provider_id: self.provider_id.clone(),
            price_bucket: self.price.map(|p| p.round() as i64),
        }
    }
}
