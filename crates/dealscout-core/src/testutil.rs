//! Test utilities: scripted mock providers and a concurrency gauge.
//!
//! Handwritten mocks for dependency injection in unit and integration tests.
//! Shared counters use `Arc` so clones handed to the engine stay observable
//! from the test.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::SessionConfig;
use crate::error::ProviderError;
use crate::models::{ProviderInfo, RawListing};
use crate::task::Stage;
use crate::traits::{Provider, ProviderRequest};

/// Session configuration with small, test-friendly values.
pub fn test_config() -> SessionConfig {
    SessionConfig {
        max_concurrent_providers: 4,
        max_items_per_provider: 35,
        settle_delay: Duration::from_millis(100),
        nav_timeout: Duration::from_millis(1_000),
        selector_timeout: Duration::from_millis(400),
        session_deadline: Duration::from_secs(10),
        max_query_length: 120,
    }
}

/// A fixed-price raw listing with a URL derived from its title.
pub fn raw(title: &str, price: f64) -> RawListing {
    let slug = title.trim().to_lowercase().replace(' ', "-");
    RawListing::new(title, Some(price), format!("https://example.com/item/{slug}"))
}

// ---------------------------------------------------------------------------
// ConcurrencyGauge
// ---------------------------------------------------------------------------

/// Counts how many provider calls are in flight and the highest count seen.
#[derive(Debug, Clone, Default)]
pub struct ConcurrencyGauge {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Mark one call as in flight until the returned guard drops.
    pub fn enter(&self) -> GaugeGuard {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        GaugeGuard {
            active: Arc::clone(&self.active),
        }
    }
}

#[derive(Debug)]
pub struct GaugeGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// MockProvider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Behavior {
    Respond(Vec<RawListing>),
    Delay(Duration, Vec<RawListing>),
    Fail(ProviderError),
    Hang,
    Panic(String),
}

/// Provider with a scripted behaviour.
#[derive(Debug, Clone)]
pub struct MockProvider {
    info: ProviderInfo,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    gauge: Option<ConcurrencyGauge>,
}

impl MockProvider {
    fn with_behavior(id: &str, behavior: Behavior) -> Self {
        Self {
            info: ProviderInfo::new(id, id.to_uppercase(), 50),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            gauge: None,
        }
    }

    /// Returns `listings` immediately.
    pub fn responding(id: &str, listings: Vec<RawListing>) -> Self {
        Self::with_behavior(id, Behavior::Respond(listings))
    }

    /// Returns `listings` after `delay`.
    pub fn delayed(id: &str, delay: Duration, listings: Vec<RawListing>) -> Self {
        Self::with_behavior(id, Behavior::Delay(delay, listings))
    }

    pub fn failing(id: &str, error: ProviderError) -> Self {
        Self::with_behavior(id, Behavior::Fail(error))
    }

    /// Never completes.
    pub fn hanging(id: &str) -> Self {
        Self::with_behavior(id, Behavior::Hang)
    }

    pub fn panicking(id: &str, message: &str) -> Self {
        Self::with_behavior(id, Behavior::Panic(message.to_string()))
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.info.weight = weight;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.info.name = name.to_string();
        self
    }

    /// Track in-flight calls of this provider (and any sharing the gauge).
    pub fn with_gauge(mut self, gauge: ConcurrencyGauge) -> Self {
        self.gauge = Some(gauge);
        self
    }

    /// Number of times `search` was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Provider for MockProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn search(&self, request: ProviderRequest) -> Result<Vec<RawListing>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.gauge.as_ref().map(ConcurrencyGauge::enter);
        request.progress.report(Stage::Navigating);

        match &self.behavior {
            Behavior::Respond(listings) => {
                request.progress.report(Stage::Parsing);
                Ok(listings.clone())
            }
            Behavior::Delay(delay, listings) => {
                tokio::time::sleep(*delay).await;
                request.progress.report(Stage::Parsing);
                Ok(listings.clone())
            }
            Behavior::Fail(error) => Err(error.clone()),
            Behavior::Hang => {
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
            Behavior::Panic(message) => panic!("{message}"),
        }
    }
}
