//! Contact-form complaints.

use chrono::Utc;
use safetracker_common::AppResult;
use safetracker_db::{entities::complaint, repositories::ComplaintRepository};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

/// Complaint service for business logic.
#[derive(Clone)]
pub struct ComplaintService {
    complaint_repo: ComplaintRepository,
}

/// Input for submitting a complaint.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateComplaintInput {
    /// Sender name.
    #[validate(length(min = 1, max = 256))]
    pub name: String,

    /// Sender email.
    #[validate(email)]
    pub email: String,

    /// Subject line.
    #[validate(length(min = 1, max = 512))]
    pub subject: String,

    /// Message body.
    #[validate(length(min = 1, max = 8192))]
    pub message: String,
}

impl ComplaintService {
    /// Create a new complaint service.
    #[must_use]
    pub const fn new(complaint_repo: ComplaintRepository) -> Self {
        Self { complaint_repo }
    }

    /// Store a complaint.
    pub async fn submit(&self, input: CreateComplaintInput) -> AppResult<complaint::Model> {
        input.validate()?;

        let model = complaint::ActiveModel {
            name: Set(input.name),
            email: Set(input.email),
            subject: Set(input.subject),
            message: Set(input.message),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let created = self.complaint_repo.create(model).await?;
        tracing::info!(complaint_id = created.id, "Complaint received");
        Ok(created)
    }

    /// All complaints, newest first.
    pub async fn list(&self) -> AppResult<Vec<complaint::Model>> {
        self.complaint_repo.list_newest_first().await
    }
}
