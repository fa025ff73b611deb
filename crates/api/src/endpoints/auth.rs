//! Signup and login.

use axum::{Json, Router, extract::State, routing::post};
use safetracker_common::AppResult;
use safetracker_core::{LoginView, SignupForm, SignupRequest};
use safetracker_db::entities::account::AccountRole;
use serde::Serialize;

use crate::{extractors::FormFields, middleware::AppState};

/// Signup response.
#[derive(Serialize)]
pub struct SignupResponse {
    pub message: &'static str,
    pub user_id: i32,
    pub role: AccountRole,
}

/// Register a new account from a multipart form.
async fn signup(
    State(state): State<AppState>,
    mut form: FormFields,
) -> AppResult<Json<SignupResponse>> {
    let signup = SignupForm {
        username: form.required("username")?,
        // The web client posts the field as "Mobile".
        mobile: form
            .text("Mobile")
            .or_else(|| form.text("mobile"))
            .unwrap_or_default(),
        email: form.required("email")?,
        role: form.required("role")?,
        password: form.required("password")?,
        address: form.text("address"),
        image: form.take_file("image"),
    };

    let request = SignupRequest::try_from(signup)?;
    let outcome = state.account_service.signup(request).await?;

    Ok(Json(SignupResponse {
        message: "Signup successful",
        user_id: outcome.user_id,
        role: outcome.role,
    }))
}

/// Login response.
#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: LoginView,
}

/// Log in with username and password.
async fn login(State(state): State<AppState>, form: FormFields) -> AppResult<Json<LoginResponse>> {
    let username = form.required("username")?;
    let password = form.required("password")?;

    let user = state.account_service.login(&username, &password).await?;

    Ok(Json(LoginResponse {
        message: "Login successful",
        user,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}
