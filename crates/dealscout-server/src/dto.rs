use serde::{Deserialize, Serialize};

use dealscout_client::config::clamp_max_items;
use dealscout_core::{ProviderInfo, QueryOptions, RankedResult, SearchOutcome, SessionSummary};

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Query string accepted by both search endpoints.
///
/// Values arrive as raw strings so a malformed `limit` or `auctions` falls
/// back to its default instead of rejecting the request.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct SearchParams {
    /// Search text, e.g. `nintendo switch lite`
    pub q: Option<String>,
    /// Max listings kept per retailer (5-120)
    pub limit: Option<String>,
    /// Include auction listings (default true; `0`, `false`, `no`, `off` disable)
    pub auctions: Option<String>,
    /// `relevance`, `price_low`, `price_high` or `ending_soon`
    pub sort: Option<String>,
}

impl SearchParams {
    pub fn query_text(&self) -> &str {
        self.q.as_deref().unwrap_or_default()
    }

    pub fn options(&self) -> QueryOptions {
        let mut options = QueryOptions::default().with_sort(
            self.sort
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        );
        if let Some(limit) = self.limit.as_deref().and_then(|l| l.trim().parse::<i64>().ok()) {
            options = options.with_max_items(clamp_max_items(limit.max(0) as usize));
        }
        if !parse_flag(self.auctions.as_deref(), true) {
            options = options.without_auctions();
        }
        options
    }
}

fn parse_flag(raw: Option<&str>, default: bool) -> bool {
    match raw {
        None => default,
        Some(value) => !matches!(value, "0" | "false" | "False" | "no" | "off"),
    }
}

/// Ranked listings plus the per-provider session summary.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SearchResponse {
    /// `{ sort, total, listings }`, listings in ranked order
    #[schema(value_type = Object)]
    pub results: RankedResult,
    /// Provider statuses and counts for the session
    #[schema(value_type = Object)]
    pub summary: SessionSummary,
}

impl From<SearchOutcome> for SearchResponse {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            results: outcome.results,
            summary: outcome.summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProviderResponse {
    pub id: String,
    pub name: String,
    pub weight: u32,
}

impl From<&ProviderInfo> for ProviderResponse {
    fn from(info: &ProviderInfo) -> Self {
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            weight: info.weight,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ProviderListResponse {
    pub providers: Vec<ProviderResponse>,
    pub total: usize,
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_sec: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use dealscout_core::SortOrder;

    use super::*;

    fn params(limit: Option<&str>, auctions: Option<&str>, sort: Option<&str>) -> SearchParams {
        SearchParams {
            q: Some("ps5".into()),
            limit: limit.map(Into::into),
            auctions: auctions.map(Into::into),
            sort: sort.map(Into::into),
        }
    }

    #[test]
    fn defaults_when_params_are_absent() {
        let options = SearchParams::default().options();
        assert_eq!(options, QueryOptions::default());
    }

    #[test]
    fn limit_is_clamped_and_garbage_ignored() {
        assert_eq!(params(Some("500"), None, None).options().max_items, Some(120));
        assert_eq!(params(Some("1"), None, None).options().max_items, Some(5));
        assert_eq!(params(Some("-3"), None, None).options().max_items, Some(5));
        assert_eq!(params(Some("lots"), None, None).options().max_items, None);
    }

    #[test]
    fn auction_flag_accepts_common_falsy_values() {
        for off in ["0", "false", "False", "no", "off"] {
            assert!(!params(None, Some(off), None).options().include_auctions, "{off}");
        }
        assert!(params(None, Some("1"), None).options().include_auctions);
        assert!(params(None, Some("yes"), None).options().include_auctions);
    }

    #[test]
    fn unknown_sort_falls_back_to_relevance() {
        assert_eq!(
            params(None, None, Some("price_low")).options().sort,
            SortOrder::PriceLow
        );
        assert_eq!(
            params(None, None, Some("cheapest")).options().sort,
            SortOrder::Relevance
        );
    }
}
