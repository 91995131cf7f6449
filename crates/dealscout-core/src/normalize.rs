use std::collections::HashSet;

use crate::models::{Listing, ProviderInfo, Query, RawListing};
use crate::relevance::{self, ItemKind};

/// Turn one provider's raw listings into normalized [`Listing`]s.
///
/// Drops untitled, repeated-URL, non-positive-price and (when the query
/// excludes them) auction listings, and stops at the query's item cap.
/// Topical filtering is the provider's job; whatever it returns is trusted
/// to be about the query.
pub fn normalize_listings(info: &ProviderInfo, query: &Query, raw: Vec<RawListing>) -> Vec<Listing> {
    let mut seen_urls = HashSet::new();
    let mut listings = Vec::with_capacity(raw.len().min(query.max_items()));

    for item in raw {
        if listings.len() >= query.max_items() {
            break;
        }

        let title = item.title.trim();
        let url = item.url.trim();
        if title.is_empty() || url.is_empty() {
            continue;
        }
        if !seen_urls.insert(url.to_string()) {
            continue;
        }
        if item.price.is_some_and(|p| !p.is_finite() || p <= 0.0) {
            continue;
        }
        if item.auction && !query.include_auctions() {
            continue;
        }

        listings.push(Listing {
            provider_id: info.id.clone(),
            source: info.name.clone(),
            title: title.to_string(),
            price: item.price,
            url: url.to_string(),
            image_url: item.image_url.filter(|u| !u.trim().is_empty()),
            kind: item.kind.unwrap_or_else(|| ItemKind::classify(title)),
            auction: item.auction,
            auction_end: item.auction_end,
            title_score: relevance::title_match_score(title, query.text(), query.tokens()),
            provider_weight: info.weight,
        });
    }

    listings
}
