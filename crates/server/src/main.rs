//! SafeTracker server entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{Json, Router, extract::DefaultBodyLimit, http::HeaderValue, routing::get};
use safetracker_api::{AppState, router as api_router};
use safetracker_common::{Config, LocalStorage, StorageBackend};
use safetracker_core::{AccountService, ComplaintService, IncidentService, Notifier, SmtpNotifier};
use safetracker_db::repositories::{AccountRepository, ComplaintRepository, IncidentRepository};
use serde_json::{Value, json};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "safetracker=debug,tower_http=debug".into());

    // SAFETRACKER_LOG_FORMAT=json switches to one JSON object per line.
    let json = std::env::var("SAFETRACKER_LOG_FORMAT").is_ok_and(|f| f == "json");

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

async fn welcome() -> Json<Value> {
    Json(json!({ "message": "Welcome to SafeTracker API" }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting SafeTracker server...");

    let config = Config::load()?;

    let db = safetracker_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    safetracker_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);
    let account_repo = AccountRepository::new(Arc::clone(&db));
    let incident_repo = IncidentRepository::new(Arc::clone(&db));
    let complaint_repo = ComplaintRepository::new(Arc::clone(&db));

    let upload_dir = PathBuf::from(&config.storage.upload_dir);
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        upload_dir.clone(),
        config.storage.base_url.clone(),
    ));

    if config.smtp.is_none() {
        warn!("SMTP is not configured; completion emails will only be logged");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(SmtpNotifier::new(
        config.smtp.as_ref(),
        &config.server.url,
    )?);

    if config.admin.token.is_none() {
        warn!("No admin token configured; admin endpoints are disabled");
    }

    let state = AppState {
        account_service: AccountService::new(account_repo.clone(), storage),
        incident_service: IncidentService::new(incident_repo, account_repo, notifier),
        complaint_service: ComplaintService::new(complaint_repo),
        admin_token: config.admin.token.as_deref().map(Arc::from),
        dashboard_url: Arc::from(config.server.dashboard_url.as_str()),
    };

    let max_body = config.storage.max_upload_bytes;
    let app = Router::new()
        .route("/", get(welcome))
        .nest("/api/users", api_router())
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server.cors_origins));

    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
