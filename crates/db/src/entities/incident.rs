//! Incident entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Incident lifecycle status.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    #[sea_orm(string_value = "reported")]
    #[default]
    Reported,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "awaiting_confirmation")]
    AwaitingConfirmation,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl IncidentStatus {
    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reported => "reported",
            Self::InProgress => "in_progress",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "incident")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,

    /// Free-form street address
    #[sea_orm(column_type = "Text")]
    pub full_address: String,

    /// Reported position, later overwritten by live-location updates
    #[sea_orm(nullable)]
    pub latitude: Option<f64>,

    #[sea_orm(nullable)]
    pub longitude: Option<f64>,

    pub status: IncidentStatus,

    pub created_at: DateTimeWithTimeZone,

    /// Account that filed the incident
    pub reporter_id: i32,

    /// Set by a successful accept, cleared when the reporter rejects the work
    #[sea_orm(nullable)]
    pub volunteer_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::ReporterId",
        to = "super::account::Column::Id"
    )]
    Reporter,
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::VolunteerId",
        to = "super::account::Column::Id"
    )]
    Volunteer,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reporter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
