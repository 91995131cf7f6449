//! Text signals used for relevance: tokenization, item classification and
//! query intent.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "by", "deal", "deals", "for", "from", "in", "of", "on", "or", "sale",
    "the", "to", "with",
];

const ACCESSORY_KEYWORDS: &[&str] = &[
    "adapter",
    "bag",
    "battery",
    "bundle",
    "cable",
    "case",
    "charger",
    "charging",
    "controller",
    "cord",
    "cover",
    "dock",
    "earbuds",
    "earphones",
    "grip",
    "headset",
    "holder",
    "joystick",
    "keyboard",
    "kit",
    "mouse",
    "mount",
    "pouch",
    "power",
    "protector",
    "protective",
    "screen",
    "shell",
    "skin",
    "stand",
    "strap",
    "stylus",
    "travel",
];

/// Words that mark a listing as the device itself rather than an add-on.
const CONSOLE_KEYWORDS: &[&str] = &["console", "system", "handheld"];

/// Coarse classification of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Console,
    Accessory,
}

impl ItemKind {
    /// Classify a listing title.
    ///
    /// Device words win over accessory words, so "PS5 Console with
    /// Controller" is a console. Titles with neither count as consoles.
    pub fn classify(title: &str) -> Self {
        let words: HashSet<String> = tokenize(title).into_iter().collect();
        if CONSOLE_KEYWORDS.iter().any(|k| words.contains(*k)) {
            return ItemKind::Console;
        }
        if ACCESSORY_KEYWORDS.iter().any(|k| words.contains(*k)) {
            return ItemKind::Accessory;
        }
        ItemKind::Console
    }
}

/// What the user is primarily looking for, derived from the query.
pub type Intent = ItemKind;

/// Lowercased alphanumeric runs of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Significant query tokens: length > 1 and not a stopword.
pub fn query_tokens(query: &str) -> Vec<String> {
    tokenize(query)
        .into_iter()
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// A query naming an accessory keyword is after accessories.
pub fn query_intent(tokens: &[String]) -> Intent {
    if tokens
        .iter()
        .any(|t| ACCESSORY_KEYWORDS.contains(&t.as_str()))
    {
        ItemKind::Accessory
    } else {
        ItemKind::Console
    }
}

/// Whether `title` shares at least one token with the query.
///
/// An empty token list matches everything.
pub fn is_relevant_title(title: &str, tokens: &[String]) -> bool {
    if tokens.is_empty() {
        return true;
    }
    let words: HashSet<String> = tokenize(title).into_iter().collect();
    tokens.iter().any(|t| words.contains(t))
}

/// 100 for a verbatim phrase hit plus 10 per query token present.
pub fn title_match_score(title: &str, query: &str, tokens: &[String]) -> u32 {
    if tokens.is_empty() {
        return 0;
    }
    let words: HashSet<String> = tokenize(title).into_iter().collect();
    let matched = tokens.iter().filter(|t| words.contains(*t)).count() as u32;
    let phrase = if title.to_lowercase().contains(&query.to_lowercase()) {
        100
    } else {
        0
    };
    phrase + matched * 10
}

/// Title reduced to its tokens, for dedup comparison.
pub fn normalize_title(title: &str) -> String {
    tokenize(title).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation() {
        assert_eq!(
            tokenize("PlayStation-5 Console (Disc)"),
            vec!["playstation", "5", "console", "disc"]
        );
    }

    #[test]
    fn query_tokens_drop_stopwords_and_single_chars() {
        assert_eq!(query_tokens("deals on the PS5 a"), vec!["ps5"]);
        assert_eq!(
            query_tokens("Nintendo Switch Lite"),
            vec!["nintendo", "switch", "lite"]
        );
    }

    #[test]
    fn classify_prefers_console_words() {
        assert_eq!(ItemKind::classify("PlayStation 5 Console"), ItemKind::Console);
        assert_eq!(ItemKind::classify("PS5 Controller"), ItemKind::Accessory);
        assert_eq!(
            ItemKind::classify("PS5 Console with Extra Controller"),
            ItemKind::Console
        );
        assert_eq!(ItemKind::classify("Xbox Series X"), ItemKind::Console);
    }

    #[test]
    fn intent_follows_accessory_keywords() {
        assert_eq!(query_intent(&query_tokens("PS5")), ItemKind::Console);
        assert_eq!(
            query_intent(&query_tokens("ps5 controller")),
            ItemKind::Accessory
        );
    }

    #[test]
    fn relevance_requires_shared_token() {
        let tokens = query_tokens("ps5");
        assert!(is_relevant_title("Sony PS5 Slim", &tokens));
        assert!(!is_relevant_title("Xbox Series X", &tokens));
        assert!(is_relevant_title("anything", &[]));
    }

    #[test]
    fn title_score_rewards_phrase_and_tokens() {
        let tokens = query_tokens("switch lite");
        assert_eq!(
            title_match_score("Nintendo Switch Lite Blue", "switch lite", &tokens),
            120
        );
        assert_eq!(
            title_match_score("Switch OLED Lite-weight case", "switch lite", &tokens),
            20
        );
        assert_eq!(title_match_score("Xbox", "switch lite", &tokens), 0);
    }

    #[test]
    fn normalize_title_collapses_case_and_punctuation() {
        assert_eq!(
            normalize_title("  PS5   Controller - WHITE "),
            normalize_title("ps5 controller white")
        );
    }
}
