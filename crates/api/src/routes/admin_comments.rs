//! Admin comment routes, nested under status updates like the thread
//! view they render into.

use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use uuid::Uuid;

use architex_common::error::AppError;
use architex_common::types::AdminComment;
use architex_engine::admin_comment::AdminCommentService;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/status-updates/{id}/comments", get(list_comments))
        .route("/api/status-updates/{id}/comments", post(create_comment))
        .route(
            "/api/status-updates/comments/{id}/read",
            put(mark_comment_read),
        )
        .route("/api/status-updates/comments/{id}", delete(delete_comment))
}

#[derive(Debug, serde::Deserialize)]
struct CreateCommentParams {
    content: String,
}

/// GET /api/status-updates/:id/comments — Thread view, oldest first.
async fn list_comments(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(status_update_id): Path<Uuid>,
) -> Result<Json<Vec<AdminComment>>, AppError> {
    let comments =
        AdminCommentService::list_by_status_update(&state.pool, status_update_id).await?;
    Ok(Json(comments))
}

/// POST /api/status-updates/:id/comments — Create a comment and notify
/// the status update's author.
async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(status_update_id): Path<Uuid>,
    Json(params): Json<CreateCommentParams>,
) -> Result<Json<AdminComment>, AppError> {
    let comment = AdminCommentService::create(
        &state.pool,
        status_update_id,
        auth.actor(),
        &params.content,
    )
    .await?;

    let dispatcher = state.dispatcher.clone();
    let snapshot = comment.clone();
    tokio::spawn(async move {
        if let Err(error) = dispatcher.admin_comment_created(snapshot).await {
            tracing::error!(error = %error, "Admin comment dispatch failed");
        }
    });

    Ok(Json(comment))
}

/// PUT /api/status-updates/comments/:id/read — Mark a comment as read.
async fn mark_comment_read(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    AdminCommentService::mark_read(&state.pool, id).await?;
    Ok(Json(
        serde_json::json!({"message": "Admin comment marked as read"}),
    ))
}

/// DELETE /api/status-updates/comments/:id — Soft-delete a comment
/// (author only).
async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    AdminCommentService::delete(&state.pool, id, auth.actor()).await?;
    Ok(Json(
        serde_json::json!({"message": "Admin comment deleted successfully"}),
    ))
}
