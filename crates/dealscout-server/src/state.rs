use std::time::Instant;

use dealscout_core::{AnyProvider, SearchEngine};

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub engine: SearchEngine<AnyProvider>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: SearchEngine<AnyProvider>) -> Self {
        Self {
            engine,
            started_at: Instant::now(),
        }
    }
}
