//! API integration tests.
//!
//! These drive the full router with a mock database behind it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use safetracker_api::{AppState, router as api_router};
use safetracker_common::{LocalStorage, StorageBackend};
use safetracker_core::{AccountService, ComplaintService, IncidentService, Notifier, SmtpNotifier};
use safetracker_db::{
    entities::{
        account::{self, AccountRole},
        incident::{self, IncidentStatus},
    },
    repositories::{AccountRepository, ComplaintRepository, IncidentRepository},
};
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use serde_json::Value;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";
const BOUNDARY: &str = "safetracker-test-boundary";

fn create_test_state(db: DatabaseConnection) -> AppState {
    let db = Arc::new(db);
    let account_repo = AccountRepository::new(Arc::clone(&db));
    let incident_repo = IncidentRepository::new(Arc::clone(&db));
    let complaint_repo = ComplaintRepository::new(Arc::clone(&db));

    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        std::env::temp_dir().join("safetracker-api-tests"),
        "uploads".to_string(),
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::disabled("http://127.0.0.1:8500"));

    AppState {
        account_service: AccountService::new(account_repo.clone(), storage),
        incident_service: IncidentService::new(incident_repo, account_repo, notifier),
        complaint_service: ComplaintService::new(complaint_repo),
        admin_token: Some(Arc::from(ADMIN_TOKEN)),
        dashboard_url: Arc::from("http://127.0.0.1:5500/pages/user.html"),
    }
}

fn create_test_app(db: DatabaseConnection) -> Router {
    Router::new()
        .nest("/api/users", api_router())
        .with_state(create_test_state(db))
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn test_account(id: i32, username: &str, role: AccountRole) -> account::Model {
    account::Model {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        mobile: "5550100".to_string(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaA".to_string(),
        role,
        profile_image: None,
        address: None,
        emergency_contact_email: None,
        is_approved: true,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

fn test_incident(id: i32, status: IncidentStatus, volunteer_id: Option<i32>) -> incident::Model {
    incident::Model {
        id,
        title: "Fire".to_string(),
        full_address: "12 Elm St".to_string(),
        latitude: None,
        longitude: None,
        status,
        created_at: Utc::now().into(),
        reporter_id: 1,
        volunteer_id,
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str)>) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some((name, file_name)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\nPNGDATA\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn multipart_request(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_admin_endpoints_require_token() {
    for (method, uri) in [
        ("GET", "/api/users/users-raw"),
        ("DELETE", "/api/users/admin/user/1"),
        ("PUT", "/api/users/admin/approve/1"),
        ("GET", "/api/users/complaints"),
    ] {
        let app = create_test_app(empty_db());
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_admin_wrong_token_rejected() {
    let app = create_test_app(empty_db());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/users-raw")
                .header(header::AUTHORIZATION, "Bearer not-the-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_token_prefix_rejected() {
    for token in [&ADMIN_TOKEN[..ADMIN_TOKEN.len() - 1], "test-admin-token-extra", ""] {
        let app = create_test_app(empty_db());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/users/users-raw")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "token {token:?}");
    }
}

#[tokio::test]
async fn test_users_raw_hides_password_hash() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[
            test_account(1, "rita", AccountRole::User),
            test_account(2, "vic", AccountRole::Volunteer),
        ]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/users-raw")
                .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let users = json.as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1]["role"], "volunteer");
    assert!(users[0].get("password_hash").is_none());
}

#[tokio::test]
async fn test_approve_plain_user_is_bad_request() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_account(1, "rita", AccountRole::User)]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/users/admin/approve/1")
                .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Only volunteers need approval");
}

#[tokio::test]
async fn test_signup_volunteer_without_image() {
    let app = create_test_app(empty_db());
    let body = multipart_body(
        &[
            ("username", "vic"),
            ("Mobile", "5550100"),
            ("email", "vic@example.com"),
            ("role", "volunteer"),
            ("password", "hunter22"),
            ("address", "4 Oak Rd"),
        ],
        None,
    );

    let response = app
        .oneshot(multipart_request("/api/users/signup", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Volunteer must upload image");
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_signup_volunteer_without_anything() {
    let app = create_test_app(empty_db());
    let body = multipart_body(
        &[
            ("username", "vic"),
            ("Mobile", "5550100"),
            ("email", "vic@example.com"),
            ("role", "volunteer"),
            ("password", "hunter22"),
        ],
        None,
    );

    let response = app
        .oneshot(multipart_request("/api/users/signup", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Volunteer must upload image and enter address");
}

#[tokio::test]
async fn test_signup_user_with_image() {
    let app = create_test_app(empty_db());
    let body = multipart_body(
        &[
            ("username", "rita"),
            ("Mobile", "5550100"),
            ("email", "rita@example.com"),
            ("role", "user"),
            ("password", "hunter22"),
        ],
        Some(("image", "me.png")),
    );

    let response = app
        .oneshot(multipart_request("/api/users/signup", body))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "User should not upload image");
}

#[tokio::test]
async fn test_login_unknown_user_urlencoded() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<account::Model>::new()])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/users/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("username=ghost&password=nope"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Invalid credentials");
}

#[tokio::test]
async fn test_accept_assigned_incident_is_conflict() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_incident(1, IncidentStatus::InProgress, Some(2))]])
        .append_query_results([[test_account(3, "val", AccountRole::Volunteer)]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/users/incidents/1/accept?volunteer_id=3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Incident already assigned");
}

#[tokio::test]
async fn test_complete_reports_simulated_email() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_incident(1, IncidentStatus::InProgress, Some(2))]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .append_query_results([[test_account(1, "rita", AccountRole::User)]])
        .append_query_results([[test_account(2, "vic", AccountRole::Volunteer)]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/users/incidents/1/complete?volunteer_id=2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json["message"],
        "Incident marked as completed, awaiting user confirmation"
    );
    assert_eq!(json["email_result"]["status"], "failed_simulated");
}

#[tokio::test]
async fn test_confirm_no_reports_reported_status() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_incident(1, IncidentStatus::AwaitingConfirmation, Some(2))]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/users/incidents/1/confirm?confirmed=false")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Response recorded");
    assert_eq!(json["status"], "reported");
}

#[tokio::test]
async fn test_verify_missing_incident_renders_html_404() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<incident::Model>::new()])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/incidents/42/verify?choice=yes")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "<h1>Incident not found</h1>");
}

#[tokio::test]
async fn test_verify_no_keeps_pending_page() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_incident(1, IncidentStatus::AwaitingConfirmation, Some(2))]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/incidents/1/verify?choice=no")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Confirmation Pending"));
    assert!(html.contains("Go to Dashboard"));
}

#[tokio::test]
async fn test_verify_without_choice_renders_pending_page() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_incident(1, IncidentStatus::AwaitingConfirmation, Some(2))]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/incidents/1/verify")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let html = body_text(response).await;
    assert!(html.contains("Confirmation Pending"));
}

#[tokio::test]
async fn test_delete_incident_by_other_user_is_forbidden() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_incident(1, IncidentStatus::Reported, None)]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/users/incidents/1?user_id=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["detail"], "Not authorized to delete this incident");
}

#[tokio::test]
async fn test_incident_status_projection() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([[test_incident(1, IncidentStatus::Reported, None)]])
        .into_connection();
    let app = create_test_app(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/incident/me/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "Fire");
    assert_eq!(json["full_address"], "12 Elm St");
    assert_eq!(json["status"], "reported");
}
