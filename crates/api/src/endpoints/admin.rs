//! Admin endpoints. Every handler requires [`AdminAuth`].

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, put},
};
use safetracker_common::AppResult;
use safetracker_db::entities::account;

use crate::{extractors::AdminAuth, middleware::AppState, response::MessageResponse};

/// Every account, including pending volunteers.
async fn list_users_raw(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<account::Model>>> {
    Ok(Json(state.account_service.list_raw().await?))
}

async fn delete_user(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<MessageResponse> {
    state.account_service.delete_account(user_id).await?;
    Ok(MessageResponse::new("User and their data removed successfully"))
}

async fn approve_volunteer(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<MessageResponse> {
    let volunteer = state.account_service.approve(user_id).await?;
    Ok(MessageResponse::new(format!(
        "Volunteer {} approved successfully",
        volunteer.username
    )))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users-raw", get(list_users_raw))
        .route("/admin/user/{user_id}", delete(delete_user))
        .route("/admin/approve/{user_id}", put(approve_volunteer))
}
