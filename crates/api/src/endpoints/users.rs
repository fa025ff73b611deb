//! Account self-service endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::put,
};
use safetracker_common::{AppError, AppResult};
use safetracker_core::{ProfileUpdate, ProfileView};
use serde::Deserialize;

use crate::{extractors::FormFields, middleware::AppState, response::MessageResponse};

/// Emergency contact update.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub emergency_contact_email: Option<String>,
}

async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<MessageResponse> {
    state
        .account_service
        .update_emergency_contact(user_id, req.emergency_contact_email)
        .await?;

    Ok(MessageResponse::new("User updated successfully"))
}

/// Update username, email, address or photo from a multipart form.
async fn update_profile(
    State(state): State<AppState>,
    mut form: FormFields,
) -> AppResult<Json<ProfileView>> {
    let account_id = form
        .required("user_id")?
        .trim()
        .parse::<i32>()
        .map_err(|_| AppError::BadRequest("user_id must be an integer".to_string()))?;

    let update = ProfileUpdate {
        account_id,
        username: form.text("username"),
        email: form.text("email"),
        address: form.text("address"),
        image: form.take_file("image"),
    };

    Ok(Json(state.account_service.update_profile(update).await?))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/{user_id}", put(update_user))
        .route("/profile/update", put(update_profile))
}
