use thiserror::Error;

/// Application-wide error types for Dealscout.
///
/// Provider failures never surface here: they are contained by the task
/// runner and reported as [`ProviderError`] inside the session summary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Session configuration is unusable (e.g. zero worker capacity).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Search text is empty or otherwise unusable.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The worker pool was shut down while a task waited for a slot.
    #[error("Worker pool closed")]
    PoolClosed,

    /// The event consumer went away before the session finished.
    #[error("Session closed")]
    SessionClosed,
}

/// Failure of a single provider call.
///
/// Recovered locally by the task runner and surfaced only as per-provider
/// status; never aborts a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection, DNS or transport-level failure.
    #[error("network failure: {0}")]
    Network(String),

    /// The page loaded but its markup did not yield listings as expected.
    #[error("markup mismatch: {0}")]
    Parse(String),

    /// The site refused the request (403/429, captcha wall, bot check).
    #[error("blocked by site: {0}")]
    Blocked(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The call was abandoned because its session was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// The provider panicked; the panic was caught at the task boundary.
    #[error("provider panicked: {0}")]
    Panicked(String),
}

impl ProviderError {
    /// Stable lowercase tag used in summaries and emitted events.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Network(_) => "network",
            ProviderError::Parse(_) => "parse",
            ProviderError::Blocked(_) => "blocked",
            ProviderError::Http { .. } => "http",
            ProviderError::Cancelled => "cancelled",
            ProviderError::Panicked(_) => "panicked",
        }
    }

    /// Classify an HTTP status the way retailer sites use them.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            403 | 429 => ProviderError::Blocked(format!("HTTP {status} for {url}")),
            _ => ProviderError::Http {
                status,
                message: format!("unexpected status for {url}"),
            },
        }
    }
}
