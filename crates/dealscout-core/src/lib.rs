pub mod aggregator;
pub mod config;
pub mod error;
pub mod event;
pub mod models;
pub mod normalize;
pub mod pool;
pub mod ranker;
pub mod relevance;
pub mod session;
pub mod task;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use aggregator::{ProviderSummary, SessionState, SessionSummary};
pub use config::SessionConfig;
pub use error::{AppError, ProviderError};
pub use event::{CloseReason, EventKind, EventPayload, SessionEvent};
pub use models::{Listing, ProviderInfo, Query, QueryOptions, RawListing, SortOrder};
pub use ranker::RankedResult;
pub use relevance::ItemKind;
pub use session::{SearchEngine, SearchOutcome, SessionHandle};
pub use task::{Stage, TaskReporter, TaskState, TracingTaskReporter};
pub use traits::{AnyProvider, Provider, ProviderRequest};
