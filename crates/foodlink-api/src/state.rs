use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use foodlink_db::Database;
use foodlink_gateway::dispatcher::Dispatcher;
use foodlink_types::events::{ChangeEvent, ChangeKind, Table};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
    pub dispatcher: Dispatcher,
}

impl AppStateInner {
    /// Run a blocking store call off the async runtime.
    pub async fn run_db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::Internal
            })?
            .map_err(ApiError::from)
    }

    /// Put a committed row change on the realtime feed.
    pub fn publish<T: Serialize>(&self, table: Table, kind: ChangeKind, row: &T) {
        self.dispatcher.publish(ChangeEvent::new(table, kind, row));
    }
}
