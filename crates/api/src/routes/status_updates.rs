//! Status update routes.
//!
//! Creation triggers the admin fan-out off the request path: the
//! response is sent as soon as the row is persisted and the dispatch
//! task is spawned. A failed notification never invalidates the create.

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::StatusUpdate;
use architex_engine::status_update::{ListOrder, StatusUpdateFilter, StatusUpdateService};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/status-updates", get(list_status_updates))
        .route("/api/status-updates", post(create_status_update))
        .route("/api/status-updates/{id}", get(show_status_update))
        .route("/api/status-updates/{id}/read", put(mark_status_update_read))
        .route("/api/status-updates/{id}", delete(delete_status_update))
        .route(
            "/api/admin/status-updates/deleted",
            get(list_deleted_status_updates),
        )
}

#[derive(Debug, serde::Deserialize)]
struct ListParams {
    job_id: Option<Uuid>,
    user_id: Option<Uuid>,
    is_read: Option<bool>,
    order: Option<ListOrder>,
}

#[derive(Debug, serde::Deserialize)]
struct CreateStatusUpdateParams {
    job_id: Uuid,
    content: String,
}

#[derive(Debug, serde::Deserialize)]
struct DeletedParams {
    job_id: Option<Uuid>,
}

/// GET /api/status-updates — List status updates with optional filters.
async fn list_status_updates(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<StatusUpdate>>, AppError> {
    let filter = StatusUpdateFilter {
        job_id: params.job_id,
        user_id: params.user_id,
        is_read: params.is_read,
    };
    let updates =
        StatusUpdateService::list(&state.pool, filter, params.order.unwrap_or_default()).await?;
    Ok(Json(updates))
}

/// POST /api/status-updates — Create a status update and notify admins.
async fn create_status_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(params): Json<CreateStatusUpdateParams>,
) -> Result<Json<StatusUpdate>, AppError> {
    let update =
        StatusUpdateService::create(&state.pool, params.job_id, auth.actor(), &params.content)
            .await?;

    let dispatcher = state.dispatcher.clone();
    let snapshot = update.clone();
    tokio::spawn(async move {
        if let Err(error) = dispatcher.status_update_created(snapshot).await {
            tracing::error!(error = %error, "Status update dispatch failed");
        }
    });

    Ok(Json(update))
}

/// GET /api/status-updates/:id — Show a single status update.
async fn show_status_update(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusUpdate>, AppError> {
    let update = StatusUpdateService::get(&state.pool, id).await?;
    Ok(Json(update))
}

/// PUT /api/status-updates/:id/read — Mark a status update as read.
async fn mark_status_update_read(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    StatusUpdateService::mark_read(&state.pool, id).await?;
    Ok(Json(
        serde_json::json!({"message": "Status update marked as read"}),
    ))
}

/// DELETE /api/status-updates/:id — Soft-delete a status update.
async fn delete_status_update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    StatusUpdateService::delete(&state.pool, id, auth.actor()).await?;
    Ok(Json(
        serde_json::json!({"message": "Status update deleted successfully"}),
    ))
}

/// GET /api/admin/status-updates/deleted — Audit view of soft-deleted rows.
async fn list_deleted_status_updates(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<DeletedParams>,
) -> Result<Json<Vec<StatusUpdate>>, AppError> {
    auth.require_admin()?;
    let updates = StatusUpdateService::list_deleted(&state.pool, params.job_id).await?;
    Ok(Json(updates))
}
