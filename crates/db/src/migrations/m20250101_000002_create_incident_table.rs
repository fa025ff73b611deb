//! Create incident table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Incident::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Incident::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Incident::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Incident::FullAddress).text().not_null())
                    .col(ColumnDef::new(Incident::Latitude).double())
                    .col(ColumnDef::new(Incident::Longitude).double())
                    .col(
                        ColumnDef::new(Incident::Status)
                            .string_len(32)
                            .not_null()
                            .default("reported"),
                    )
                    .col(
                        ColumnDef::new(Incident::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Incident::ReporterId).integer().not_null())
                    .col(ColumnDef::new(Incident::VolunteerId).integer())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_incident_reporter_id")
                            .from(Incident::Table, Incident::ReporterId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_incident_volunteer_id")
                            .from(Incident::Table, Incident::VolunteerId)
                            .to(Account::Table, Account::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: status (available incidents)
        manager
            .create_index(
                Index::create()
                    .name("idx_incident_status")
                    .table(Incident::Table)
                    .col(Incident::Status)
                    .to_owned(),
            )
            .await?;

        // Index: reporter_id
        manager
            .create_index(
                Index::create()
                    .name("idx_incident_reporter_id")
                    .table(Incident::Table)
                    .col(Incident::ReporterId)
                    .to_owned(),
            )
            .await?;

        // Index: volunteer_id
        manager
            .create_index(
                Index::create()
                    .name("idx_incident_volunteer_id")
                    .table(Incident::Table)
                    .col(Incident::VolunteerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Incident::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Incident {
    Table,
    Id,
    Title,
    FullAddress,
    Latitude,
    Longitude,
    Status,
    CreatedAt,
    ReporterId,
    VolunteerId,
}

#[derive(Iden)]
enum Account {
    Table,
    Id,
}
