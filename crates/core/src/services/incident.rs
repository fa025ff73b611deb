//! Incident service.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use safetracker_common::{AppError, AppResult};
use safetracker_db::{
    entities::{
        account::AccountRole,
        incident::{self, IncidentStatus},
    },
    repositories::{AccountRepository, IncidentRepository, VolunteerChange},
};
use sea_orm::{IntoActiveModel, Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::lifecycle::{self, LifecycleEvent, VerifyChoice};
use super::notifier::{
    CompletionNotice, DeliveryReport, FALLBACK_VOLUNTEER_EMAIL, FALLBACK_VOLUNTEER_NAME, Notifier,
};

const UNKNOWN_REPORTER: &str = "Unknown";
const NO_VOLUNTEER: &str = "Waiting...";

/// Incident service for business logic.
#[derive(Clone)]
pub struct IncidentService {
    incident_repo: IncidentRepository,
    account_repo: AccountRepository,
    notifier: Arc<dyn Notifier>,
}

/// Input for reporting a new incident.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateIncidentInput {
    /// Short description of what happened.
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    /// Where it happened.
    #[validate(length(min = 1, max = 2048))]
    pub full_address: String,

    /// Latitude, if the client had a fix.
    pub latitude: Option<f64>,

    /// Longitude, if the client had a fix.
    pub longitude: Option<f64>,

    /// Account filing the report.
    pub reporter_id: i32,
}

/// Reporter edits. Empty strings are ignored like absent fields.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateIncidentInput {
    /// New title.
    #[validate(length(max = 256))]
    pub title: Option<String>,

    /// New address.
    #[validate(length(max = 2048))]
    pub full_address: Option<String>,

    /// New latitude.
    pub latitude: Option<f64>,

    /// New longitude.
    pub longitude: Option<f64>,
}

/// Listing projection with reporter and volunteer names joined in.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentView {
    /// Incident id.
    pub id: i32,
    /// Title.
    pub title: String,
    /// Address.
    pub full_address: String,
    /// Last known latitude.
    pub latitude: Option<f64>,
    /// Last known longitude.
    pub longitude: Option<f64>,
    /// Lifecycle status.
    pub status: IncidentStatus,
    /// When it was reported.
    pub created_at: DateTimeWithTimeZone,
    /// Reporting account.
    pub reporter_id: i32,
    /// Assigned volunteer, if any.
    pub volunteer_id: Option<i32>,
    /// Reporter username, or `Unknown`.
    pub reporter_name: String,
    /// Volunteer username, or `Waiting...`.
    pub volunteer_name: String,
}

/// Response to incident creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedIncident {
    /// New incident id.
    pub id: i32,
    /// Title as stored.
    pub title: String,
    /// Address as stored.
    pub full_address: String,
    /// Always `reported`.
    pub status: IncidentStatus,
    /// Creation time.
    pub created_at: DateTimeWithTimeZone,
}

/// What a reporter sees when checking on one incident.
#[derive(Debug, Clone, Serialize)]
pub struct IncidentStatusView {
    /// Title.
    pub title: String,
    /// Address.
    pub full_address: String,
    /// Latest latitude (the volunteer's live position once shared).
    pub latitude: Option<f64>,
    /// Latest longitude.
    pub longitude: Option<f64>,
    /// When it was reported.
    pub created_at: DateTimeWithTimeZone,
    /// Lifecycle status.
    pub status: IncidentStatus,
}

impl From<incident::Model> for IncidentStatusView {
    fn from(m: incident::Model) -> Self {
        Self {
            title: m.title,
            full_address: m.full_address,
            latitude: m.latitude,
            longitude: m.longitude,
            created_at: m.created_at,
            status: m.status,
        }
    }
}

impl IncidentService {
    /// Create a new incident service.
    #[must_use]
    pub fn new(
        incident_repo: IncidentRepository,
        account_repo: AccountRepository,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            incident_repo,
            account_repo,
            notifier,
        }
    }

    /// Report a new incident. The reporter must exist.
    pub async fn create(&self, input: CreateIncidentInput) -> AppResult<CreatedIncident> {
        input.validate()?;
        self.account_repo.get_by_id(input.reporter_id).await?;

        let model = incident::ActiveModel {
            title: Set(input.title),
            full_address: Set(input.full_address),
            latitude: Set(input.latitude),
            longitude: Set(input.longitude),
            status: Set(IncidentStatus::Reported),
            created_at: Set(Utc::now().into()),
            reporter_id: Set(input.reporter_id),
            volunteer_id: Set(None),
            ..Default::default()
        };

        let created = self.incident_repo.create(model).await?;
        tracing::info!(
            incident_id = created.id,
            reporter_id = created.reporter_id,
            "Incident reported"
        );

        Ok(CreatedIncident {
            id: created.id,
            title: created.title,
            full_address: created.full_address,
            status: created.status,
            created_at: created.created_at,
        })
    }

    /// Every incident, with names joined in.
    pub async fn list_all(&self) -> AppResult<Vec<IncidentView>> {
        let incidents = self.incident_repo.list_all().await?;
        self.project(incidents, false).await
    }

    /// Incidents filed by one reporter.
    pub async fn list_by_reporter(&self, reporter_id: i32) -> AppResult<Vec<IncidentView>> {
        let incidents = self.incident_repo.list_by_reporter(reporter_id).await?;
        self.project(incidents, false).await
    }

    /// Incidents still waiting for a volunteer.
    pub async fn list_available(&self) -> AppResult<Vec<IncidentView>> {
        let incidents = self.incident_repo.list_by_status(IncidentStatus::Reported).await?;
        self.project(incidents, true).await
    }

    /// Status projection of a single incident.
    pub async fn get_status(&self, id: i32) -> AppResult<IncidentStatusView> {
        Ok(self.incident_repo.get_by_id(id).await?.into())
    }

    /// Apply a reporter's edits.
    pub async fn update(
        &self,
        id: i32,
        requester_id: i32,
        input: UpdateIncidentInput,
    ) -> AppResult<incident::Model> {
        input.validate()?;
        let current = self.incident_repo.get_by_id(id).await?;
        if current.reporter_id != requester_id {
            return Err(AppError::Forbidden(
                "Not authorized to update this incident".to_string(),
            ));
        }

        let mut model = current.into_active_model();
        if let Some(title) = input.title.filter(|t| !t.is_empty()) {
            model.title = Set(title);
        }
        if let Some(address) = input.full_address.filter(|a| !a.is_empty()) {
            model.full_address = Set(address);
        }
        if let Some(lat) = input.latitude {
            model.latitude = Set(Some(lat));
        }
        if let Some(lng) = input.longitude {
            model.longitude = Set(Some(lng));
        }

        self.incident_repo.update(model).await
    }

    /// Delete an incident on behalf of its reporter.
    pub async fn delete(&self, id: i32, requester_id: i32) -> AppResult<()> {
        let current = self.incident_repo.get_by_id(id).await?;
        if current.reporter_id != requester_id {
            return Err(AppError::Forbidden(
                "Not authorized to delete this incident".to_string(),
            ));
        }

        self.incident_repo.delete(id).await?;
        tracing::info!(incident_id = id, "Incident deleted");
        Ok(())
    }

    /// Assign a volunteer. At most one accept per incident ever wins, and only
    /// approved volunteers may accept.
    pub async fn accept(&self, id: i32, volunteer_id: i32) -> AppResult<incident::Model> {
        let current = self.incident_repo.get_by_id(id).await?;
        let volunteer = self.account_repo.get_by_id(volunteer_id).await?;
        if volunteer.role != AccountRole::Volunteer || !volunteer.is_approved {
            tracing::debug!(
                incident_id = id,
                account_id = volunteer_id,
                "Accept by non-volunteer"
            );
            return Err(AppError::Forbidden(
                "Only approved volunteers can accept incidents".to_string(),
            ));
        }
        self.apply(current, LifecycleEvent::Accept { volunteer_id }).await
    }

    /// Put an incident (back) in progress.
    pub async fn start(&self, id: i32) -> AppResult<incident::Model> {
        let current = self.incident_repo.get_by_id(id).await?;
        self.apply(current, LifecycleEvent::Start).await
    }

    /// Record the volunteer's position.
    pub async fn update_live_location(
        &self,
        id: i32,
        latitude: f64,
        longitude: f64,
    ) -> AppResult<()> {
        if !self.incident_repo.update_location(id, latitude, longitude).await? {
            return Err(AppError::IncidentNotFound(id.to_string()));
        }
        tracing::debug!(incident_id = id, latitude, longitude, "Live location updated");
        Ok(())
    }

    /// Mark the work done and email the reporter.
    ///
    /// The transition stands whatever happens to the email.
    pub async fn complete(&self, id: i32) -> AppResult<(incident::Model, DeliveryReport)> {
        let current = self.incident_repo.get_by_id(id).await?;
        let updated = self.apply(current, LifecycleEvent::Complete).await?;
        let report = self.notify_reporter(&updated).await;
        Ok((updated, report))
    }

    /// The reporter's answer through the API.
    pub async fn confirm(&self, id: i32, confirmed: bool) -> AppResult<incident::Model> {
        let current = self.incident_repo.get_by_id(id).await?;
        self.apply(current, LifecycleEvent::Confirm { confirmed }).await
    }

    /// The reporter's answer through the emailed link.
    pub async fn verify(&self, id: i32, choice: VerifyChoice) -> AppResult<incident::Model> {
        let current = self.incident_repo.get_by_id(id).await?;
        self.apply(current, LifecycleEvent::Verify(choice)).await
    }

    async fn apply(
        &self,
        current: incident::Model,
        event: LifecycleEvent,
    ) -> AppResult<incident::Model> {
        let step = lifecycle::transition(current.status, current.volunteer_id, event)?;
        if step.is_noop() {
            return Ok(current);
        }

        let won = self
            .incident_repo
            .compare_and_set_status(current.id, step.from, step.to, step.volunteer)
            .await?;

        if !won {
            tracing::debug!(incident_id = current.id, ?event, "Lost transition race");
            return Err(match event {
                LifecycleEvent::Accept { .. } => {
                    AppError::AlreadyAssigned("Incident already assigned".to_string())
                }
                _ => AppError::InvalidTransition(format!(
                    "Incident {} changed while it was being updated",
                    current.id
                )),
            });
        }

        tracing::info!(
            incident_id = current.id,
            from = %step.from,
            to = %step.to,
            "Incident status changed"
        );

        let volunteer_id = match step.volunteer {
            VolunteerChange::Keep => current.volunteer_id,
            VolunteerChange::Assign(v) => Some(v),
            VolunteerChange::Clear => None,
        };

        Ok(incident::Model {
            status: step.to,
            volunteer_id,
            ..current
        })
    }

    async fn notify_reporter(&self, incident: &incident::Model) -> DeliveryReport {
        let reporter = match self.account_repo.find_by_id(incident.reporter_id).await {
            Ok(Some(r)) if !r.email.is_empty() => r,
            Ok(_) => {
                tracing::info!(incident_id = incident.id, "Skipping email: reporter has no email");
                return DeliveryReport::skipped("no_reporter_email");
            }
            Err(e) => return DeliveryReport::failed_simulated(e.to_string()),
        };

        let volunteer = match incident.volunteer_id {
            Some(vid) => self.account_repo.find_by_id(vid).await.ok().flatten(),
            None => None,
        };
        let (volunteer_email, volunteer_name) = volunteer.map_or_else(
            || {
                (
                    FALLBACK_VOLUNTEER_EMAIL.to_string(),
                    FALLBACK_VOLUNTEER_NAME.to_string(),
                )
            },
            |v| (v.email, v.username),
        );

        let notice = CompletionNotice {
            incident_id: incident.id,
            incident_title: incident.title.clone(),
            reporter_email: reporter.email,
            volunteer_email,
            volunteer_name,
        };

        self.notifier.notify_completion(&notice).await
    }

    async fn project(
        &self,
        incidents: Vec<incident::Model>,
        always_waiting: bool,
    ) -> AppResult<Vec<IncidentView>> {
        let mut ids: Vec<i32> = incidents
            .iter()
            .flat_map(|i| std::iter::once(i.reporter_id).chain(i.volunteer_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let names: HashMap<i32, String> = self
            .account_repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a.username))
            .collect();

        Ok(incidents
            .into_iter()
            .map(|i| {
                let reporter_name = names
                    .get(&i.reporter_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_REPORTER.to_string());
                let volunteer_name = if always_waiting {
                    None
                } else {
                    i.volunteer_id.and_then(|v| names.get(&v).cloned())
                }
                .unwrap_or_else(|| NO_VOLUNTEER.to_string());

                IncidentView {
                    id: i.id,
                    title: i.title,
                    full_address: i.full_address,
                    latitude: i.latitude,
                    longitude: i.longitude,
                    status: i.status,
                    created_at: i.created_at,
                    reporter_id: i.reporter_id,
                    volunteer_id: i.volunteer_id,
                    reporter_name,
                    volunteer_name,
                }
            })
            .collect())
    }
}
