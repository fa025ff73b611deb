//! Account repository.

use std::sync::Arc;

use crate::entities::{Account, Incident, account, incident, incident::IncidentStatus};
use safetracker_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, Value, sea_query::Expr,
};

/// Account repository for database operations.
#[derive(Clone)]
pub struct AccountRepository {
    db: Arc<DatabaseConnection>,
}

impl AccountRepository {
    /// Create a new account repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an account by ID.
    pub async fn find_by_id(&self, id: i32) -> AppResult<Option<account::Model>> {
        Account::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an account by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: i32) -> AppResult<account::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::AccountNotFound(id.to_string()))
    }

    /// Find accounts by IDs.
    pub async fn find_by_ids(&self, ids: &[i32]) -> AppResult<Vec<account::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Account::find()
            .filter(account::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an account by exact username.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<account::Model>> {
        Account::find()
            .filter(account::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an account by exact email.
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<account::Model>> {
        Account::find()
            .filter(account::Column::Email.eq(email))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether another account (not `exclude_id`) already uses this username.
    pub async fn username_taken_by_other(
        &self,
        username: &str,
        exclude_id: i32,
    ) -> AppResult<bool> {
        let found = Account::find()
            .filter(account::Column::Username.eq(username))
            .filter(account::Column::Id.ne(exclude_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Whether another account (not `exclude_id`) already uses this email.
    pub async fn email_taken_by_other(&self, email: &str, exclude_id: i32) -> AppResult<bool> {
        let found = Account::find()
            .filter(account::Column::Email.eq(email))
            .filter(account::Column::Id.ne(exclude_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Create a new account.
    ///
    /// Unique violations surface as [`AppError::Conflict`].
    pub async fn create(&self, model: account::ActiveModel) -> AppResult<account::Model> {
        model.insert(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// Update an account.
    pub async fn update(&self, model: account::ActiveModel) -> AppResult<account::Model> {
        model.update(self.db.as_ref()).await.map_err(AppError::from)
    }

    /// List every account, oldest first.
    pub async fn list_all(&self) -> AppResult<Vec<account::Model>> {
        Account::find()
            .order_by_asc(account::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an account together with its incident footprint.
    ///
    /// Incidents it reported are removed, incidents it volunteered on go back
    /// to `reported` with no volunteer. Runs in a single transaction.
    pub async fn delete_with_cascade(&self, id: i32) -> AppResult<()> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let removed = Incident::delete_many()
            .filter(incident::Column::ReporterId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let released = Incident::update_many()
            .col_expr(incident::Column::VolunteerId, Expr::value(Value::Int(None)))
            .col_expr(incident::Column::Status, Expr::value(IncidentStatus::Reported))
            .filter(incident::Column::VolunteerId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Account::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            account_id = id,
            incidents_removed = removed.rows_affected,
            incidents_released = released.rows_affected,
            "Deleted account"
        );

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::account::AccountRole;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_account(id: i32, username: &str, role: AccountRole) -> account::Model {
        account::Model {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            mobile: "5550100".to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role,
            profile_image: None,
            address: None,
            emergency_contact_email: None,
            is_approved: role == AccountRole::User,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let acct = create_test_account(1, "alice", AccountRole::User);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[acct.clone()]])
                .into_connection(),
        );

        let repo = AccountRepository::new(db);
        let result = repo.find_by_id(1).await.unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<account::Model>::new()])
                .into_connection(),
        );

        let repo = AccountRepository::new(db);
        let result = repo.get_by_id(42).await;

        match result {
            Err(AppError::AccountNotFound(id)) => assert_eq!(id, "42"),
            other => panic!("expected AccountNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_find_by_ids_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = AccountRepository::new(db);
        let result = repo.find_by_ids(&[]).await.unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_username_taken_by_other() {
        let other = create_test_account(2, "bob", AccountRole::User);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[other]])
                .append_query_results([Vec::<account::Model>::new()])
                .into_connection(),
        );

        let repo = AccountRepository::new(db);
        assert!(repo.username_taken_by_other("bob", 1).await.unwrap());
        assert!(!repo.email_taken_by_other("free@example.com", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_account() {
        let acct = create_test_account(7, "vera", AccountRole::Volunteer);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[acct.clone()]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 7,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = AccountRepository::new(db);
        let active = account::ActiveModel {
            username: Set("vera".to_string()),
            email: Set("vera@example.com".to_string()),
            mobile: Set("5550100".to_string()),
            password_hash: Set("$argon2id$stub".to_string()),
            role: Set(AccountRole::Volunteer),
            is_approved: Set(false),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let created = repo.create(active).await.unwrap();
        assert_eq!(created.id, 7);
        assert!(!created.is_approved);
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    #[tokio::test]
    async fn test_delete_with_cascade_releases_and_removes_in_order() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(2), exec(1), exec(1)])
                .into_connection(),
        );

        let repo = AccountRepository::new(Arc::clone(&db));
        repo.delete_with_cascade(3).await.unwrap();
        drop(repo);

        let log = Arc::try_unwrap(db).unwrap().into_transaction_log();
        let statements: Vec<_> = log
            .iter()
            .flat_map(|t| t.statements().iter().cloned())
            .filter(|s| s.sql.starts_with("DELETE") || s.sql.starts_with("UPDATE"))
            .collect();

        assert_eq!(statements.len(), 3);

        assert!(statements[0].sql.starts_with(r#"DELETE FROM "incident""#));
        assert!(statements[0].sql.contains(r#""reporter_id" = "#));

        assert!(statements[1].sql.starts_with(r#"UPDATE "incident" SET"#));
        assert!(statements[1].sql.contains(r#""volunteer_id" = "#));
        assert!(statements[1].sql.contains(r#""status" = "#));
        let values = format!("{:?}", statements[1].values);
        assert!(values.contains("Int(None)"));
        assert!(values.contains("reported"));
        assert!(values.contains("Int(Some(3))"));

        assert!(statements[2].sql.starts_with(r#"DELETE FROM "account""#));
        assert!(format!("{:?}", statements[2].values).contains("Int(Some(3))"));
    }
}
