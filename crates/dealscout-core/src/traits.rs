use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::error::ProviderError;
use crate::models::{ProviderInfo, Query, RawListing};
use crate::task::ProgressReporter;

/// Everything a provider gets for one call.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub query: Arc<Query>,
    /// Soft cap; providers may return more, the task runner trims.
    pub max_items: usize,
    /// Hard deadline the task runner enforces on this call.
    pub budget: Duration,
    pub progress: ProgressReporter,
}

/// One retailer/marketplace search capability.
///
/// Implementations must be stateless per call: re-running a search with the
/// same request must not mutate anything shared.
pub trait Provider: Send + Sync + Clone + 'static {
    fn info(&self) -> &ProviderInfo;

    fn search(
        &self,
        request: ProviderRequest,
    ) -> impl Future<Output = Result<Vec<RawListing>, ProviderError>> + Send;
}

/// Object-safe mirror of [`Provider`], used by [`AnyProvider`].
trait ErasedProvider: Send + Sync {
    fn erased_info(&self) -> &ProviderInfo;

    fn erased_search(
        &self,
        request: ProviderRequest,
    ) -> BoxFuture<'_, Result<Vec<RawListing>, ProviderError>>;
}

impl<P: Provider> ErasedProvider for P {
    fn erased_info(&self) -> &ProviderInfo {
        Provider::info(self)
    }

    fn erased_search(
        &self,
        request: ProviderRequest,
    ) -> BoxFuture<'_, Result<Vec<RawListing>, ProviderError>> {
        Box::pin(self.search(request))
    }
}

/// A provider with its concrete type erased, so one registry can hold
/// different implementations.
#[derive(Clone)]
pub struct AnyProvider(Arc<dyn ErasedProvider>);

impl AnyProvider {
    pub fn new<P: Provider>(provider: P) -> Self {
        Self(Arc::new(provider))
    }
}

impl fmt::Debug for AnyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyProvider")
            .field(&self.0.erased_info().id)
            .finish()
    }
}

impl Provider for AnyProvider {
    fn info(&self) -> &ProviderInfo {
        self.0.erased_info()
    }

    fn search(
        &self,
        request: ProviderRequest,
    ) -> impl Future<Output = Result<Vec<RawListing>, ProviderError>> + Send {
        self.0.erased_search(request)
    }
}
