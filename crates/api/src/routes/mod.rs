pub mod admin_comments;
pub mod health;
pub mod notifications;
pub mod status_updates;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(status_updates::router())
        .merge(admin_comments::router())
        .merge(notifications::router())
        .with_state(state)
}
