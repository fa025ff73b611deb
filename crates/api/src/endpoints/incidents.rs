//! Incident endpoints, including the lifecycle transitions and the HTML
//! page behind the emailed confirmation links.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use safetracker_common::{AppError, AppResult};
use safetracker_core::{
    CreateIncidentInput, CreatedIncident, DeliveryReport, IncidentStatusView, IncidentView,
    UpdateIncidentInput, VerifyChoice, notifier::escape_html,
};
use safetracker_db::entities::incident::{self, IncidentStatus};
use serde::{Deserialize, Serialize};

use crate::{middleware::AppState, response::MessageResponse};

/// Identifies the account acting on an incident.
#[derive(Debug, Deserialize)]
pub struct RequesterQuery {
    pub user_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct AcceptQuery {
    pub volunteer_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    /// Missing means "no".
    #[serde(default)]
    pub choice: Option<String>,
}

#[derive(Serialize)]
pub struct LiveLocationResponse {
    pub message: &'static str,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub message: &'static str,
    pub email_result: DeliveryReport,
}

#[derive(Serialize)]
pub struct ConfirmResponse {
    pub message: &'static str,
    pub status: IncidentStatus,
}

async fn create_incident(
    State(state): State<AppState>,
    Json(input): Json<CreateIncidentInput>,
) -> AppResult<Json<CreatedIncident>> {
    Ok(Json(state.incident_service.create(input).await?))
}

async fn list_incidents(State(state): State<AppState>) -> AppResult<Json<Vec<IncidentView>>> {
    Ok(Json(state.incident_service.list_all().await?))
}

async fn list_user_incidents(
    State(state): State<AppState>,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<IncidentView>>> {
    Ok(Json(state.incident_service.list_by_reporter(user_id).await?))
}

async fn list_available(State(state): State<AppState>) -> AppResult<Json<Vec<IncidentView>>> {
    Ok(Json(state.incident_service.list_available().await?))
}

async fn get_status(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
) -> AppResult<Json<IncidentStatusView>> {
    Ok(Json(state.incident_service.get_status(incident_id).await?))
}

async fn update_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
    Query(requester): Query<RequesterQuery>,
    Json(input): Json<UpdateIncidentInput>,
) -> AppResult<Json<incident::Model>> {
    let updated = state
        .incident_service
        .update(incident_id, requester.user_id, input)
        .await?;
    Ok(Json(updated))
}

async fn delete_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
    Query(requester): Query<RequesterQuery>,
) -> AppResult<MessageResponse> {
    state
        .incident_service
        .delete(incident_id, requester.user_id)
        .await?;
    Ok(MessageResponse::new("Incident deleted"))
}

async fn accept_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
    Query(query): Query<AcceptQuery>,
) -> AppResult<MessageResponse> {
    state
        .incident_service
        .accept(incident_id, query.volunteer_id)
        .await?;
    Ok(MessageResponse::new("Incident accepted and started"))
}

async fn start_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
) -> AppResult<MessageResponse> {
    state.incident_service.start(incident_id).await?;
    Ok(MessageResponse::new("Incident started"))
}

async fn update_live_location(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
    Query(location): Query<LocationQuery>,
) -> AppResult<Json<LiveLocationResponse>> {
    state
        .incident_service
        .update_live_location(incident_id, location.lat, location.lng)
        .await?;
    Ok(Json(LiveLocationResponse {
        message: "Live location updated",
        lat: location.lat,
        lng: location.lng,
    }))
}

async fn complete_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
) -> AppResult<Json<CompleteResponse>> {
    let (_, email_result) = state.incident_service.complete(incident_id).await?;
    Ok(Json(CompleteResponse {
        message: "Incident marked as completed, awaiting user confirmation",
        email_result,
    }))
}

async fn confirm_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
    Query(query): Query<ConfirmQuery>,
) -> AppResult<Json<ConfirmResponse>> {
    let updated = state
        .incident_service
        .confirm(incident_id, query.confirmed)
        .await?;
    Ok(Json(ConfirmResponse {
        message: "Response recorded",
        status: updated.status,
    }))
}

/// Target of the YES/NO links in the completion email. Always answers with
/// HTML, errors included.
async fn verify_incident(
    State(state): State<AppState>,
    Path(incident_id): Path<i32>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let choice = VerifyChoice::parse(query.choice.as_deref().unwrap_or("no"));
    let dashboard = escape_html(&state.dashboard_url);

    match state.incident_service.verify(incident_id, choice).await {
        Ok(incident) => Html(render_verify_page(&incident, choice, &dashboard)).into_response(),
        Err(AppError::IncidentNotFound(_)) => {
            (StatusCode::NOT_FOUND, Html("<h1>Incident not found</h1>")).into_response()
        }
        Err(AppError::InvalidTransition(_)) => (
            StatusCode::CONFLICT,
            Html(page(
                "orange",
                "Link No Longer Valid",
                "<p>This incident is not waiting for your confirmation any more.</p>",
                &dashboard,
            )),
        )
            .into_response(),
        Err(e) => {
            let status = e.status_code();
            tracing::error!(incident_id, error = %e, "Verify link failed");
            (status, Html("<h1>Something went wrong</h1>")).into_response()
        }
    }
}

fn render_verify_page(
    incident: &incident::Model,
    choice: VerifyChoice,
    dashboard: &str,
) -> String {
    match choice {
        VerifyChoice::Yes => page(
            "green",
            "&#10004; Incident Closed",
            &format!(
                "<p>Thank you! The incident '{}' has been successfully closed.</p>",
                escape_html(&incident.title)
            ),
            dashboard,
        ),
        VerifyChoice::No => page(
            "orange",
            "&#9888; Confirmation Pending",
            "<p>You have selected <b>NO</b>.</p>\
             <p>The incident status remains 'Awaiting Confirmation'.</p>\
             <p>Please contact the volunteer if the work is not finished.</p>",
            dashboard,
        ),
    }
}

fn page(color: &str, heading: &str, body: &str, dashboard: &str) -> String {
    format!(
        "<html><body style='text-align:center; padding:50px; font-family:sans-serif;'>\
         <h1 style='color:{color};'>{heading}</h1>{body}\
         <a href=\"{dashboard}\">Go to Dashboard</a></body></html>"
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/incidents", post(create_incident).get(list_incidents))
        .route("/incidents/user/{user_id}", get(list_user_incidents))
        .route("/available-incidents", get(list_available))
        .route("/incident/me/{incident_id}", get(get_status))
        .route(
            "/incidents/{incident_id}",
            put(update_incident).delete(delete_incident),
        )
        .route("/incidents/{incident_id}/accept", put(accept_incident))
        .route("/incidents/{incident_id}/start", put(start_incident))
        .route("/incidents/{incident_id}/live-location", put(update_live_location))
        .route("/incidents/{incident_id}/complete", put(complete_incident))
        .route("/incidents/{incident_id}/confirm", put(confirm_incident))
        .route("/incidents/{incident_id}/verify", get(verify_incident))
}
