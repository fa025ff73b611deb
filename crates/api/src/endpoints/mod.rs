//! API endpoints.

mod admin;
mod auth;
mod complaints;
mod incidents;
mod users;

use axum::{Router, http::Uri};
use safetracker_common::AppError;

use crate::middleware::AppState;

async fn unknown_route(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .merge(incidents::router())
        .merge(complaints::router())
        .merge(admin::router())
        .fallback(unknown_route)
}
