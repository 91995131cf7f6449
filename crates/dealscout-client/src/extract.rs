//! Listing extraction from retailer search result pages.
//!
//! Two passes: [`extract_candidates`] pulls loosely-typed candidates out of
//! the DOM (link, title, price text, image), then [`coerce`] turns them into
//! [`RawListing`]s: absolute URLs, product-page filter, topical filter,
//! parsed prices and auction flags.

use std::collections::HashSet;
use std::sync::LazyLock;

use dealscout_core::relevance::is_relevant_title;
use dealscout_core::{ProviderError, RawListing};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::price::{contains_price, find_price_text, parse_price};

/// How far up from a link the generic strategy looks for a price.
const MAX_CONTAINER_DEPTH: usize = 7;

static AUCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+\s+bids?\b|\bauction\b").expect("valid auction regex")
});

/// Retailer-specific card layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLayout {
    /// One match per product card.
    pub container: &'static str,
    pub title: &'static str,
    pub price: &'static str,
    /// Link inside the card, used when the title is not (and holds no) link.
    pub link: Option<&'static str>,
    /// Links the generic fallback scans when no card yields a listing.
    pub fallback_links: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Scan every link and look upwards for a nearby price.
    Generic,
    Cards(CardLayout),
}

/// One product-looking element found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Candidate {
    pub href: String,
    pub name: String,
    pub price_text: String,
    pub image_url: Option<String>,
    /// Text of the surrounding card, for auction detection.
    pub context: String,
}

/// Case-insensitive product-page URL patterns.
#[derive(Debug, Clone)]
pub struct ProductPaths {
    patterns: Vec<Regex>,
}

impl ProductPaths {
    pub fn new(patterns: &[&str]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")))
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// An empty pattern list accepts every URL.
    pub fn matches(&self, url: &str) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(url))
    }
}

pub fn extract_candidates(html: &str, strategy: &Strategy) -> Result<Vec<Candidate>, ProviderError> {
    let document = Html::parse_document(html);
    match strategy {
        Strategy::Generic => generic(&document, "a[href]"),
        Strategy::Cards(layout) => {
            let found = cards(&document, layout)?;
            if found.is_empty() {
                tracing::debug!(container = layout.container, "No cards found, scanning links");
                generic(&document, layout.fallback_links)
            } else {
                Ok(found)
            }
        }
    }
}

/// Turn candidates into raw listings for one retailer.
pub fn coerce(
    candidates: Vec<Candidate>,
    base_url: &Url,
    paths: &ProductPaths,
    query_tokens: &[String],
    include_auctions: bool,
    max_items: usize,
) -> Vec<RawListing> {
    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for candidate in candidates {
        if listings.len() >= max_items {
            break;
        }
        let href = candidate.href.trim();
        if href.is_empty() {
            continue;
        }
        let Some(url) = resolve(base_url, href) else {
            continue;
        };
        if !seen.insert(url.clone()) || !paths.matches(&url) {
            continue;
        }

        let name = candidate.name.trim();
        if name.is_empty() || !is_relevant_title(name, query_tokens) {
            continue;
        }
        let price_text = candidate.price_text.trim();
        let price = if price_text.is_empty() {
            None
        } else {
            parse_price(price_text)
        };
        if price.is_some_and(|p| p <= 0.0) {
            continue;
        }

        let mut listing = RawListing::new(name, price, url);
        if let Some(image) = candidate
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| resolve(base_url, s))
        {
            listing = listing.with_image(image);
        }
        if is_auction(&candidate.context) {
            // Dropped here so they do not use up the item cap.
            if !include_auctions {
                continue;
            }
            listing = listing.as_auction(None);
        }
        listings.push(listing);
    }

    listings
}

/// Auction wording: "3 bids", "1 bid", "auction".
pub fn is_auction(text: &str) -> bool {
    AUCTION_RE.is_match(text)
}

/// Absolute URL for `href` relative to the retailer's base URL.
pub fn resolve(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css).map_err(|e| ProviderError::Parse(format!("bad selector '{css}': {e}")))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_attr(scope: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// `el` itself when it is a link, else its first descendant link.
fn as_link<'a>(el: ElementRef<'a>, links: &Selector) -> Option<ElementRef<'a>> {
    if el.value().name() == "a" && el.value().attr("href").is_some() {
        Some(el)
    } else {
        el.select(links).next()
    }
}

fn push_unique(out: &mut Vec<Candidate>, seen: &mut HashSet<String>, candidate: Candidate) {
    let key = format!(
        "{}|{}|{}",
        candidate.href, candidate.name, candidate.price_text
    );
    if seen.insert(key) {
        out.push(candidate);
    }
}

fn generic(document: &Html, links_css: &str) -> Result<Vec<Candidate>, ProviderError> {
    let links = selector(links_css)?;
    let img = selector("img")?;
    let img_alt = selector("img[alt]")?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for link in document.select(&links) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let mut container = link;
        let mut context = text_of(container);
        for _ in 0..MAX_CONTAINER_DEPTH {
            if contains_price(&context) {
                break;
            }
            match container.parent().and_then(ElementRef::wrap) {
                Some(parent) => {
                    container = parent;
                    context = text_of(container);
                }
                None => break,
            }
        }
        let Some(price_text) = find_price_text(&context) else {
            continue;
        };

        let mut name = text_of(link);
        if name.is_empty() {
            name = first_attr(link, &img_alt, "alt")
                .or_else(|| first_attr(container, &img_alt, "alt"))
                .unwrap_or_default();
        }
        let image_url =
            first_attr(link, &img, "src").or_else(|| first_attr(container, &img, "src"));

        push_unique(
            &mut out,
            &mut seen,
            Candidate {
                href: href.to_string(),
                name,
                price_text: price_text.to_string(),
                image_url,
                context: context.clone(),
            },
        );
    }

    Ok(out)
}

fn cards(document: &Html, layout: &CardLayout) -> Result<Vec<Candidate>, ProviderError> {
    let container = selector(layout.container)?;
    let title_sel = selector(layout.title)?;
    let price_sel = selector(layout.price)?;
    let link_sel = layout.link.map(selector).transpose()?;
    let any_link = selector("a[href]")?;
    let img = selector("img")?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for card in document.select(&container) {
        let title = card.select(&title_sel).next();
        let link = title
            .and_then(|t| as_link(t, &any_link))
            .or_else(|| link_sel.as_ref().and_then(|s| card.select(s).next()));
        let Some(link) = link else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default();

        let name = title.map(text_of).filter(|t| !t.is_empty()).unwrap_or_else(|| text_of(link));
        let price_text = card
            .select(&price_sel)
            .next()
            .map(|p| {
                let text = text_of(p);
                if text.is_empty() {
                    p.value().attr("data-price").unwrap_or_default().to_string()
                } else {
                    text
                }
            })
            .unwrap_or_default();

        push_unique(
            &mut out,
            &mut seen,
            Candidate {
                href: href.to_string(),
                name,
                price_text,
                image_url: first_attr(card, &img, "src"),
                context: text_of(card),
            },
        );
    }

    Ok(out)
}
