//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `safetracker_test`)
//!   `TEST_DB_PASSWORD` (default: `safetracker_test`)
//!   `TEST_DB_NAME` (default: `safetracker_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use safetracker_common::AppError;
use safetracker_db::entities::{
    account::{self, AccountRole},
    incident::{self, IncidentStatus},
};
use safetracker_db::repositories::{AccountRepository, IncidentRepository, VolunteerChange};
use safetracker_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

fn new_account(username: &str, role: AccountRole) -> account::ActiveModel {
    account::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{username}@example.com")),
        mobile: Set("5550100".to_string()),
        password_hash: Set("$argon2id$stub".to_string()),
        role: Set(role),
        is_approved: Set(role == AccountRole::User),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
}

fn new_incident(reporter_id: i32) -> incident::ActiveModel {
    incident::ActiveModel {
        title: Set("Fire".to_string()),
        full_address: Set("12 Elm St".to_string()),
        status: Set(IncidentStatus::Reported),
        reporter_id: Set(reporter_id),
        created_at: Set(Utc::now().into()),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let result = TestDatabase::with_config(TestDbConfig::default()).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_username_is_conflict() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let accounts = AccountRepository::new(db.connection());

    accounts.create(new_account("alice", AccountRole::User)).await.unwrap();
    let mut dup = new_account("alice", AccountRole::User);
    dup.email = Set("other@example.com".to_string());
    let result = accounts.create(dup).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_accept_assigns_exactly_once() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let conn = db.connection();
    let accounts = AccountRepository::new(conn.clone());
    let incidents = IncidentRepository::new(conn);

    let reporter = accounts.create(new_account("rita", AccountRole::User)).await.unwrap();
    let mut volunteer_ids = Vec::new();
    for name in ["vic", "val", "vin", "vax"] {
        let v = accounts.create(new_account(name, AccountRole::Volunteer)).await.unwrap();
        volunteer_ids.push(v.id);
    }
    let created = incidents.create(new_incident(reporter.id)).await.unwrap();

    let handles: Vec<_> = volunteer_ids
        .iter()
        .map(|&vid| {
            let repo = incidents.clone();
            tokio::spawn(async move {
                repo.compare_and_set_status(
                    created.id,
                    IncidentStatus::Reported,
                    IncidentStatus::InProgress,
                    VolunteerChange::Assign(vid),
                )
                .await
                .unwrap()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let stored = incidents.get_by_id(created.id).await.unwrap();
    assert_eq!(stored.status, IncidentStatus::InProgress);
    assert!(stored.volunteer_id.is_some_and(|v| volunteer_ids.contains(&v)));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_account_cascades_to_incidents() {
    let db = TestDatabase::create_unique().await.expect("Failed to create db");
    let conn = db.connection();
    let accounts = AccountRepository::new(conn.clone());
    let incidents = IncidentRepository::new(conn);

    let reporter = accounts.create(new_account("rita", AccountRole::User)).await.unwrap();
    let volunteer = accounts
        .create(new_account("vic", AccountRole::Volunteer))
        .await
        .unwrap();
    let other = accounts.create(new_account("olga", AccountRole::User)).await.unwrap();

    let owned = incidents.create(new_incident(reporter.id)).await.unwrap();
    let helped = incidents.create(new_incident(other.id)).await.unwrap();
    incidents
        .compare_and_set_status(
            helped.id,
            IncidentStatus::Reported,
            IncidentStatus::InProgress,
            VolunteerChange::Assign(volunteer.id),
        )
        .await
        .unwrap();

    accounts.delete_with_cascade(volunteer.id).await.unwrap();
    let released = incidents.get_by_id(helped.id).await.unwrap();
    assert_eq!(released.status, IncidentStatus::Reported);
    assert!(released.volunteer_id.is_none());

    accounts.delete_with_cascade(reporter.id).await.unwrap();
    assert!(incidents.find_by_id(owned.id).await.unwrap().is_none());
    assert!(accounts.find_by_id(reporter.id).await.unwrap().is_none());

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(config.database_url().starts_with("postgres://"));
}
