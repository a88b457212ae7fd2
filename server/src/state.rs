//! Shared application state passed to every handler via Axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::store::FileStore;

/// Shared application state for the filedb server.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Blob directory and metadata index.
    pub store: Arc<FileStore>,
}

impl AppState {
    pub fn new(config: Config, store: FileStore) -> Self {
        Self {
            config: Arc::new(config),
            start_time: Instant::now(),
            store: Arc::new(store),
        }
    }
}
