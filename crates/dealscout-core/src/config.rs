use std::time::Duration;

use crate::error::AppError;

/// Values a search session consumes.
///
/// The core holds no defaults; callers build this from their own
/// configuration source (see `dealscout_client::config::Settings`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on provider calls running at the same time.
    pub max_concurrent_providers: usize,
    /// Default soft cap on listings kept per provider.
    pub max_items_per_provider: usize,
    /// Time a provider lets a page settle after it loads.
    pub settle_delay: Duration,
    pub nav_timeout: Duration,
    pub selector_timeout: Duration,
    /// Hard deadline for the whole session, measured from its start.
    pub session_deadline: Duration,
    /// Longest accepted search text, in characters.
    pub max_query_length: usize,
}

impl SessionConfig {
    /// Reject configurations that would make a session unable to run.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_concurrent_providers == 0 {
            return Err(AppError::ConfigError(
                "max_concurrent_providers must be at least 1".into(),
            ));
        }
        if self.max_items_per_provider == 0 {
            return Err(AppError::ConfigError(
                "max_items_per_provider must be at least 1".into(),
            ));
        }
        if self.session_deadline.is_zero() {
            return Err(AppError::ConfigError(
                "session_deadline must be greater than zero".into(),
            ));
        }
        if self.max_query_length == 0 {
            return Err(AppError::ConfigError(
                "max_query_length must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
