//! Process configuration read from the environment.

use std::time::Duration;

use dealscout_core::SessionConfig;

/// Runtime settings shared by the CLI and the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub settle_ms: u64,
    pub nav_timeout_ms: u64,
    pub selector_timeout_ms: u64,
    pub max_concurrent_providers: usize,
    pub max_items_per_site: usize,
    pub max_query_length: usize,
    pub session_deadline_ms: u64,
    pub headless: bool,
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            settle_ms: 1_600,
            nav_timeout_ms: 35_000,
            selector_timeout_ms: 12_000,
            max_concurrent_providers: 6,
            max_items_per_site: 35,
            max_query_length: 120,
            session_deadline_ms: 90_000,
            headless: true,
            host: "0.0.0.0".to_string(),
            port: 5_000,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable source.
    ///
    /// Unparsable numbers fall back to the default with a warning; parsed
    /// numbers are clamped into their allowed range.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let int = |name: &str, default: u64, min: u64, max: u64| -> u64 {
            match lookup(name) {
                None => default,
                Some(raw) => match raw.trim().parse::<i64>() {
                    Ok(v) => v.clamp(min as i64, max as i64) as u64,
                    Err(_) => {
                        tracing::warn!(variable = name, value = %raw, default, "Ignoring non-integer setting");
                        default
                    }
                },
            }
        };

        let headless = lookup("DEALSCOUT_HEADLESS")
            .or_else(|| lookup("PLAYWRIGHT_HEADLESS"))
            .is_none_or(|v| v.trim() != "0");

        Self {
            settle_ms: int("DEFAULT_SETTLE_MS", d.settle_ms, 500, 10_000),
            nav_timeout_ms: int("NAV_TIMEOUT_MS", d.nav_timeout_ms, 10_000, 60_000),
            selector_timeout_ms: int(
                "WAIT_FOR_SELECTOR_TIMEOUT_MS",
                d.selector_timeout_ms,
                2_000,
                30_000,
            ),
            max_concurrent_providers: int(
                "MAX_CONCURRENT_PROVIDERS",
                d.max_concurrent_providers as u64,
                1,
                16,
            ) as usize,
            max_items_per_site: int("MAX_ITEMS_PER_SITE", d.max_items_per_site as u64, 5, 120)
                as usize,
            max_query_length: int("MAX_QUERY_LENGTH", d.max_query_length as u64, 10, 300)
                as usize,
            session_deadline_ms: int(
                "SESSION_DEADLINE_MS",
                d.session_deadline_ms,
                5_000,
                300_000,
            ),
            headless,
            host: lookup("APP_HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(d.host),
            port: int("PORT", u64::from(d.port), 1, 65_535) as u16,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_concurrent_providers: self.max_concurrent_providers,
            max_items_per_provider: self.max_items_per_site,
            settle_delay: Duration::from_millis(self.settle_ms),
            nav_timeout: Duration::from_millis(self.nav_timeout_ms),
            selector_timeout: Duration::from_millis(self.selector_timeout_ms),
            session_deadline: Duration::from_millis(self.session_deadline_ms),
            max_query_length: self.max_query_length,
        }
    }
}

/// Clamp a per-request item limit into the accepted range.
pub fn clamp_max_items(requested: usize) -> usize {
    requested.clamp(5, 120)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(settings(&[]), Settings::default());
    }

    #[test]
    fn values_are_clamped() {
        let s = settings(&[
            ("MAX_CONCURRENT_PROVIDERS", "64"),
            ("NAV_TIMEOUT_MS", "10"),
            ("MAX_ITEMS_PER_SITE", "-3"),
        ]);
        assert_eq!(s.max_concurrent_providers, 16);
        assert_eq!(s.nav_timeout_ms, 10_000);
        assert_eq!(s.max_items_per_site, 5);
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let s = settings(&[("DEFAULT_SETTLE_MS", "soon"), ("PORT", "eighty")]);
        assert_eq!(s.settle_ms, 1_600);
        assert_eq!(s.port, 5_000);
    }

    #[test]
    fn headless_can_be_disabled() {
        assert!(!settings(&[("PLAYWRIGHT_HEADLESS", "0")]).headless);
        assert!(settings(&[("PLAYWRIGHT_HEADLESS", "1")]).headless);
        assert!(!settings(&[("DEALSCOUT_HEADLESS", "0"), ("PLAYWRIGHT_HEADLESS", "1")]).headless);
    }

    #[test]
    fn session_config_is_valid() {
        let config = Settings::default().session_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_deadline, Duration::from_secs(90));
        assert_eq!(config.max_items_per_provider, 35);
    }

    #[test]
    fn item_limit_clamp() {
        assert_eq!(clamp_max_items(0), 5);
        assert_eq!(clamp_max_items(50), 50);
        assert_eq!(clamp_max_items(500), 120);
    }
}
