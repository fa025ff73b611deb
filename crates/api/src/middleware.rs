//! Shared application state.

use std::sync::Arc;

use safetracker_core::{AccountService, ComplaintService, IncidentService};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Signup, login, profiles and admin actions.
    pub account_service: AccountService,
    /// Incidents and their lifecycle.
    pub incident_service: IncidentService,
    /// Contact-form complaints.
    pub complaint_service: ComplaintService,
    /// Bearer token for admin endpoints; `None` locks them entirely.
    pub admin_token: Option<Arc<str>>,
    /// Linked from the emailed confirmation pages.
    pub dashboard_url: Arc<str>,
}
