//! Rendering of search results for the terminal and for files.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use dealscout_core::{Listing, ProviderSummary, SearchOutcome, SessionSummary};
use serde::Serialize;

const TITLE_WIDTH: usize = 60;

pub fn format_price(price: Option<f64>) -> String {
    price.map(|p| format!("{p:.2}")).unwrap_or_default()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

/// Ranked listings as an aligned text table.
pub fn write_table(out: &mut impl Write, listings: &[Listing]) -> Result<()> {
    if listings.is_empty() {
        writeln!(out, "No listings found.")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:>4}  {:>10}  {:<16}  {:<width$}  URL",
        "#",
        "PRICE",
        "SOURCE",
        "TITLE",
        width = TITLE_WIDTH
    )?;
    for (i, listing) in listings.iter().enumerate() {
        let mut price = format_price(listing.price);
        if listing.auction {
            price.push('*');
        }
        writeln!(
            out,
            "{:>4}  {:>10}  {:<16}  {:<width$}  {}",
            i + 1,
            price,
            truncate(&listing.source, 16),
            truncate(&listing.title, TITLE_WIDTH),
            listing.url,
            width = TITLE_WIDTH
        )?;
    }
    if listings.iter().any(|l| l.auction) {
        writeln!(out, "\n* auction, price not final")?;
    }
    Ok(())
}

pub fn write_summary(out: &mut impl Write, summary: &SessionSummary) -> Result<()> {
    writeln!(
        out,
        "{} listings from {} providers ({} ok, {} failed, {} timed out) in {:.1}s{}",
        summary.total_listings,
        summary.providers.len(),
        summary.succeeded,
        summary.failed,
        summary.timed_out,
        summary.elapsed_ms as f64 / 1000.0,
        if summary.deadline_exceeded {
            ", deadline exceeded"
        } else {
            ""
        }
    )?;
    Ok(())
}

/// `name,price,url,source` rows, price with two decimals or empty.
pub fn write_listings_csv(writer: impl Write, listings: &[Listing]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["name", "price", "url", "source"])?;
    for listing in listings {
        csv.write_record([
            listing.title.as_str(),
            format_price(listing.price).as_str(),
            listing.url.as_str(),
            listing.source.as_str(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn save_listings_csv(path: &Path, listings: &[Listing]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    write_listings_csv(file, listings)
}

/// Per-provider health row for `dealscout check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderCheck {
    pub provider_id: String,
    pub provider_name: String,
    pub status: String,
    pub count: usize,
    pub sample_url: String,
}

/// Providers sorted emptiest first, then by name.
pub fn provider_checks(outcome: &SearchOutcome) -> Vec<ProviderCheck> {
    let mut rows: Vec<_> = outcome
        .summary
        .providers
        .iter()
        .map(|p: &ProviderSummary| ProviderCheck {
            provider_id: p.provider_id.clone(),
            provider_name: p.name.clone(),
            status: p.status.to_string(),
            count: p.found,
            sample_url: outcome
                .results
                .listings
                .iter()
                .find(|l| l.provider_id == p.provider_id)
                .map(|l| l.url.clone())
                .unwrap_or_default(),
        })
        .collect();
    rows.sort_by(|a, b| {
        a.count
            .cmp(&b.count)
            .then_with(|| a.provider_name.to_lowercase().cmp(&b.provider_name.to_lowercase()))
    });
    rows
}

pub fn write_checks_csv(writer: impl Write, rows: &[ProviderCheck]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["provider_id", "provider_name", "status", "count", "sample_url"])?;
    for row in rows {
        csv.write_record([
            row.provider_id.as_str(),
            row.provider_name.as_str(),
            row.status.as_str(),
            row.count.to_string().as_str(),
            row.sample_url.as_str(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use dealscout_core::testutil::{MockProvider, raw, test_config};
    use dealscout_core::{ItemKind, ProviderError, QueryOptions, SearchEngine};

    use super::*;

    fn listing(title: &str, price: Option<f64>) -> Listing {
        Listing {
            provider_id: "bestbuy".into(),
            source: "Best Buy".into(),
            title: title.into(),
            price,
            url: "https://www.bestbuy.com/site/x/1.p".into(),
            image_url: None,
            kind: ItemKind::Console,
            auction: false,
            auction_end: None,
            title_score: 0,
            provider_weight: 90,
        }
    }

    #[test]
    fn csv_rows_use_two_decimals_and_blank_unknown_prices() {
        let mut buf = Vec::new();
        write_listings_csv(
            &mut buf,
            &[listing("PS5, Slim", Some(449.5)), listing("PS5 Pro", None)],
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "name,price,url,source");
        assert_eq!(
            lines[1],
            "\"PS5, Slim\",449.50,https://www.bestbuy.com/site/x/1.p,Best Buy"
        );
        assert_eq!(lines[2], "PS5 Pro,,https://www.bestbuy.com/site/x/1.p,Best Buy");
    }

    #[test]
    fn table_marks_auctions() {
        let mut auction = listing("PS5 Console", Some(300.0));
        auction.auction = true;
        let mut buf = Vec::new();
        write_table(&mut buf, &[auction]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("300.00*"));
        assert!(text.contains("auction, price not final"));
    }

    #[test]
    fn long_titles_are_truncated() {
        let title = "x".repeat(100);
        assert_eq!(truncate(&title, 10).chars().count(), 10);
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn checks_list_empty_providers_first() {
        let engine = SearchEngine::new(
            vec![
                MockProvider::responding("a", vec![raw("PS5 Console", 499.0)]).with_name("Alpha"),
                MockProvider::failing("b", ProviderError::Blocked("403".into())).with_name("Beta"),
            ],
            test_config(),
        );
        let outcome = engine.search("ps5", QueryOptions::default()).await.unwrap();
        let rows = provider_checks(&outcome);

        assert_eq!(rows[0].provider_id, "b");
        assert_eq!(rows[0].status, "failed");
        assert_eq!(rows[1].count, 1);
        assert_eq!(rows[1].sample_url, "https://example.com/item/ps5-console");

        let mut buf = Vec::new();
        write_checks_csv(&mut buf, &rows).unwrap();
        assert!(String::from_utf8(buf).unwrap().starts_with("provider_id,provider_name"));
    }
}
