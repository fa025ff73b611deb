//! Contact-form complaints.

use axum::{Json, Router, extract::State, routing::post};
use safetracker_common::AppResult;
use safetracker_core::CreateComplaintInput;
use safetracker_db::entities::complaint;

use crate::{extractors::AdminAuth, middleware::AppState};

async fn create_complaint(
    State(state): State<AppState>,
    Json(input): Json<CreateComplaintInput>,
) -> AppResult<Json<complaint::Model>> {
    Ok(Json(state.complaint_service.submit(input).await?))
}

async fn list_complaints(
    _admin: AdminAuth,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<complaint::Model>>> {
    Ok(Json(state.complaint_service.list().await?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/complaints", post(create_complaint).get(list_complaints))
}
