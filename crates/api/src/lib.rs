//! HTTP API layer for SafeTracker.
//!
//! - **Endpoints**: signup/login, incidents and their lifecycle, profiles,
//!   complaints and admin actions
//! - **Extractors**: admin capability, multipart/urlencoded form fields
//! - **Middleware**: shared application state
//!
//! Built on Axum 0.8. The server mounts [`router`] under `/api/users`.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
