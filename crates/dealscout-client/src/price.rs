use std::sync::LazyLock;

use regex::Regex;

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*([0-9]{1,3}(?:,[0-9]{3})*|[0-9]+)(?:\.(\d{2}))?").expect("valid price regex")
});

/// First `$`-prefixed amount in `text`, e.g. `"$1,249.99"` → `1249.99`.
pub fn parse_price(text: &str) -> Option<f64> {
    let caps = PRICE_RE.captures(text)?;
    let dollars = caps.get(1)?.as_str().replace(',', "");
    let cents = caps.get(2).map_or("00", |m| m.as_str());
    format!("{dollars}.{cents}").parse().ok()
}

/// The matched price text, as shown on the page.
pub fn find_price_text(text: &str) -> Option<&str> {
    PRICE_RE.find(text).map(|m| m.as_str())
}

pub fn contains_price(text: &str) -> bool {
    PRICE_RE.is_match(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_formats() {
        assert_eq!(parse_price("$50"), Some(50.0));
        assert_eq!(parse_price("Now $1,249.99 was $1,399.99"), Some(1249.99));
        assert_eq!(parse_price("$ 19.5"), Some(19.0));
        assert_eq!(parse_price("US $459.00"), Some(459.0));
    }

    #[test]
    fn rejects_text_without_dollar_amount() {
        assert_eq!(parse_price("Price unavailable"), None);
        assert_eq!(parse_price("499.99"), None);
        assert!(!contains_price("Free shipping"));
    }

    #[test]
    fn finds_display_text() {
        assert_eq!(find_price_text("Sale: $29.99 today"), Some("$29.99"));
    }
}
