use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::events::EventBus;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub events: Arc<EventBus>,
}

impl AppState {
    pub fn db(&self) -> &SqlitePool {
        &self.db
    }
}
