//! In-app notification surface: the unread bell count and the admin
//! audit view over delivery failure records.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};

use architex_common::error::AppError;
use architex_common::types::{NotificationFailure, NotificationRecord};
use architex_notifier::channel::NotificationRecordStore;
use architex_notifier::failure::{FailureState, FailureStore};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route(
            "/api/admin/notification-failures",
            get(list_notification_failures),
        )
}

#[derive(Debug, serde::Deserialize)]
struct FailureParams {
    state: Option<FailureState>,
}

/// GET /api/notifications — The caller's in-app notifications.
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<NotificationRecord>>, AppError> {
    let records = NotificationRecordStore::list_for_user(&state.pool, auth.user_id).await?;
    Ok(Json(records))
}

/// GET /api/notifications/unread-count — The caller's unread count.
async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    let count = NotificationRecordStore::unread_count(&state.pool, auth.user_id).await?;
    Ok(Json(serde_json::json!({ "unread_count": count })))
}

/// GET /api/admin/notification-failures — Delivery failure audit.
async fn list_notification_failures(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<FailureParams>,
) -> Result<Json<Vec<NotificationFailure>>, AppError> {
    auth.require_admin()?;
    let failures = FailureStore::list(&state.pool, params.state).await?;
    Ok(Json(failures))
}
