//! Shared application state for the Axum API server.

use architex_common::config::AppConfig;
use architex_notifier::dispatcher::Dispatcher;
use sqlx::PgPool;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    pub dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, dispatcher: Dispatcher) -> Self {
        Self {
            pool,
            config,
            dispatcher,
        }
    }
}
