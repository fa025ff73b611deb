//! Incident repository.

use std::sync::Arc;

use crate::entities::{Incident, incident, incident::IncidentStatus};
use safetracker_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Value, sea_query::Expr,
};

/// What a status transition does to `volunteer_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolunteerChange {
    /// Leave it untouched.
    Keep,
    /// Assign the volunteer; only succeeds while the slot is empty.
    Assign(i32),
    /// Release the incident.
    Clear,
}

/// Incident repository for database operations.
#[derive(Clone)]
pub struct IncidentRepository {
    db: Arc<DatabaseConnection>,
}

impl IncidentRepository {
    /// Create a new incident repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an incident by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<incident::Model>> {
        Incident::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an incident by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<incident::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::IncidentNotFound(id.to_string()))
    }

    /// Create a new incident.
    pub async fn create(&self, model: incident::ActiveModel) -> AppResult<incident::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// Update an incident.
    pub async fn update(&self, model: incident::ActiveModel) -> AppResult<incident::Model> {
        model.update(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// Delete an incident.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        Incident::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List every incident.
    pub async fn list_all(&self) -> AppResult<Vec<incident::Model>> {
        Incident::find()
            .order_by_asc(incident::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List incidents filed by a reporter.
    pub async fn list_by_reporter(&self, reporter_id: i32) -> AppResult<Vec<incident::Model>> {
        Incident::find()
            .filter(incident::Column::ReporterId.eq(reporter_id))
            .order_by_asc(incident::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List incidents in a given status.
    pub async fn list_by_status(&self, status: IncidentStatus) -> AppResult<Vec<incident::Model>> {
        Incident::find()
            .filter(incident::Column::Status.eq(status))
            .order_by_asc(incident::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically move an incident from `expected` to `to`.
    ///
    /// The row only changes if it is still in `expected` (and, for
    /// [`VolunteerChange::Assign`], still has no volunteer). Returns `false`
    /// when another request got there first.
    pub async fn compare_and_set_status(
        &self,
        id: i32,
        expected: IncidentStatus,
        to: IncidentStatus,
        volunteer: VolunteerChange,
    ) -> AppResult<bool> {
        let mut update = Incident::update_many()
            .col_expr(incident::Column::Status, Expr::value(to))
            .filter(incident::Column::Id.eq(id))
            .filter(incident::Column::Status.eq(expected));

        update = match volunteer {
            VolunteerChange::Keep => update,
            VolunteerChange::Assign(volunteer_id) => update
                .col_expr(incident::Column::VolunteerId, Expr::value(volunteer_id))
                .filter(incident::Column::VolunteerId.is_null()),
            VolunteerChange::Clear => {
                update.col_expr(incident::Column::VolunteerId, Expr::value(Value::Int(None)))
            }
        };

        let result = update
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    /// Overwrite the coordinates of an incident. Returns `false` if it does not exist.
    pub async fn update_location(&self, id: i32, latitude: f64, longitude: f64) -> AppResult<bool> {
        let result = Incident::update_many()
            .col_expr(incident::Column::Latitude, Expr::value(latitude))
            .col_expr(incident::Column::Longitude, Expr::value(longitude))
            .filter(incident::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}
