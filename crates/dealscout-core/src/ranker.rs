//! Ordering of the accumulated listing set.
//!
//! Relevance ordering, in priority order:
//!
//! 1. relevance tier: listings whose kind matches the query intent first
//! 2. fixed-price before auction (an auction price is not final)
//! 3. price ascending, unpriced last
//! 4. provider weight descending, then original order (stable sort)
//!
//! The set is small (tens of items), so every update re-ranks from scratch.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Listing, SortOrder};
use crate::relevance::Intent;

/// An ordered snapshot of the accumulated listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub sort: SortOrder,
    pub total: usize,
    pub listings: Vec<Listing>,
}

/// 0 when the listing is what the query is after, 1 otherwise.
pub fn relevance_tier(listing: &Listing, intent: Intent) -> u8 {
    u8::from(listing.kind != intent)
}

/// Rank `listings` without mutating them.
pub fn rank(listings: &[Listing], intent: Intent, sort: SortOrder) -> RankedResult {
    let mut ordered = listings.to_vec();
    ordered.sort_by(|a, b| compare(a, b, intent, sort));
    RankedResult {
        sort,
        total: ordered.len(),
        listings: ordered,
    }
}

fn compare(a: &Listing, b: &Listing, intent: Intent, sort: SortOrder) -> Ordering {
    let primary = match sort {
        SortOrder::Relevance => relevance_tier(a, intent)
            .cmp(&relevance_tier(b, intent))
            .then(a.auction.cmp(&b.auction))
            .then(price_ascending(a.price, b.price)),
        SortOrder::PriceLow => price_ascending(a.price, b.price),
        SortOrder::PriceHigh => price_descending(a.price, b.price),
        SortOrder::EndingSoon => match (a.auction_end, b.auction_end) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    primary.then(b.provider_weight.cmp(&a.provider_weight))
}

fn price_ascending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn price_descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
