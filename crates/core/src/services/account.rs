//! Account service: signup, login, profile and admin actions.

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use safetracker_common::{AppError, AppResult, StorageBackend, sanitize_filename};
use safetracker_db::{
    entities::account::{self, AccountRole},
    repositories::AccountRepository,
};
use sea_orm::{IntoActiveModel, Set};
use serde::Serialize;
use validator::{Validate, ValidateEmail};

const PENDING_APPROVAL: &str = "Your account is pending admin approval. Please check back later.";
const INVALID_CREDENTIALS: &str = "Invalid credentials";
const DUPLICATE_ACCOUNT: &str = "Username or email already exists";

/// An uploaded image as received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied file name, not yet sanitized.
    pub file_name: String,
    /// Raw file contents.
    pub data: Vec<u8>,
}

impl UploadedImage {
    /// Browsers send an empty part when no file was picked.
    fn is_present(&self) -> bool {
        !self.file_name.is_empty()
    }
}

/// Raw signup form, before role rules are checked.
#[derive(Debug, Default)]
pub struct SignupForm {
    /// Requested username.
    pub username: String,
    /// Phone number.
    pub mobile: String,
    /// Contact email.
    pub email: String,
    /// `user` or `volunteer`, as sent.
    pub role: String,
    /// Plain-text password; hashed before storage.
    pub password: String,
    /// Volunteers only.
    pub address: Option<String>,
    /// Volunteers only.
    pub image: Option<UploadedImage>,
}

/// Fields every account has.
#[derive(Debug, Clone, Validate)]
pub struct AccountDetails {
    /// Username.
    #[validate(length(min = 1, max = 128))]
    pub username: String,

    /// Email.
    #[validate(email)]
    pub email: String,

    /// Phone number.
    #[validate(length(min = 1, max = 32))]
    pub mobile: String,

    /// Plain-text password.
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// A signup that already satisfies the per-role rules.
#[derive(Debug, Clone)]
pub enum SignupRequest {
    User(AccountDetails),
    Volunteer {
        details: AccountDetails,
        address: String,
        image: UploadedImage,
    },
}

impl TryFrom<SignupForm> for SignupRequest {
    type Error = AppError;

    fn try_from(form: SignupForm) -> Result<Self, Self::Error> {
        let image = form.image.filter(UploadedImage::is_present);
        let details = AccountDetails {
            username: form.username,
            email: form.email,
            mobile: form.mobile,
            password: form.password,
        };

        match AccountRole::parse(&form.role) {
            Some(AccountRole::Volunteer) => {
                let address = form.address.filter(|a| !a.trim().is_empty());
                match (image, address) {
                    (Some(image), Some(address)) => Ok(Self::Volunteer {
                        details,
                        address,
                        image,
                    }),
                    (None, None) => Err(AppError::BadRequest(
                        "Volunteer must upload image and enter address".to_string(),
                    )),
                    (None, Some(_)) => Err(AppError::BadRequest(
                        "Volunteer must upload image".to_string(),
                    )),
                    (Some(_), None) => Err(AppError::BadRequest(
                        "Volunteer must enter address".to_string(),
                    )),
                }
            }
            Some(AccountRole::User) => {
                if image.is_some() {
                    return Err(AppError::BadRequest(
                        "User should not upload image".to_string(),
                    ));
                }
                if form.address.is_some_and(|a| !a.is_empty()) {
                    return Err(AppError::BadRequest(
                        "User should not provide address".to_string(),
                    ));
                }
                Ok(Self::User(details))
            }
            None => Err(AppError::BadRequest(
                "Role must be 'user' or 'volunteer'".to_string(),
            )),
        }
    }
}

impl SignupRequest {
    const fn details(&self) -> &AccountDetails {
        match self {
            Self::User(details) | Self::Volunteer { details, .. } => details,
        }
    }
}

/// Result of a successful signup.
#[derive(Debug, Clone, Serialize)]
pub struct SignupOutcome {
    /// Id of the new account.
    pub user_id: i32,
    /// Role it was created with.
    pub role: AccountRole,
}

/// Public profile returned at login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginView {
    /// Account id.
    pub id: i32,
    /// Username.
    pub username: String,
    /// Role.
    pub role: AccountRole,
    /// Email.
    pub email: String,
    /// Volunteer address.
    pub address: Option<String>,
    /// Emergency contact, if set.
    pub emergency_contact_email: Option<String>,
}

impl From<account::Model> for LoginView {
    fn from(m: account::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            role: m.role,
            email: m.email,
            address: m.address,
            emergency_contact_email: m.emergency_contact_email,
        }
    }
}

/// Profile returned after a profile update.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    /// Account id.
    pub id: i32,
    /// Username.
    pub username: String,
    /// Email.
    pub email: String,
    /// Phone number.
    pub mobile: String,
    /// Role.
    pub role: AccountRole,
    /// Stored photo path.
    pub profile_image: Option<String>,
}

impl From<account::Model> for ProfileView {
    fn from(m: account::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            email: m.email,
            mobile: m.mobile,
            role: m.role,
            profile_image: m.profile_image,
        }
    }
}

/// Profile changes; every field is optional and empty strings count as absent.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    /// Account being edited.
    pub account_id: i32,
    /// New username; must not belong to another account.
    pub username: Option<String>,
    /// New email; must not belong to another account.
    pub email: Option<String>,
    /// New address.
    pub address: Option<String>,
    /// New photo.
    pub image: Option<UploadedImage>,
}

/// Account service for business logic.
#[derive(Clone)]
pub struct AccountService {
    account_repo: AccountRepository,
    storage: Arc<dyn StorageBackend>,
}

impl AccountService {
    /// Create a new account service.
    #[must_use]
    pub fn new(account_repo: AccountRepository, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            account_repo,
            storage,
        }
    }

    /// Register a new account. Volunteers start unapproved.
    pub async fn signup(&self, request: SignupRequest) -> AppResult<SignupOutcome> {
        request.details().validate()?;

        let details = request.details();
        if self.account_repo.find_by_username(&details.username).await?.is_some()
            || self.account_repo.find_by_email(&details.email).await?.is_some()
        {
            return Err(AppError::Conflict(DUPLICATE_ACCOUNT.to_string()));
        }

        let (details, role, address, stored_key, profile_image) = match request {
            SignupRequest::User(details) => (details, AccountRole::User, None, None, None),
            SignupRequest::Volunteer {
                details,
                address,
                image,
            } => {
                let key = sanitize_filename(&image.file_name);
                // Only a file this signup created may be removed on failure.
                let replaced = self.storage.exists(&key).await?;
                let stored = self.storage.store(&key, &image.data).await?;
                (
                    details,
                    AccountRole::Volunteer,
                    Some(address),
                    (!replaced).then_some(key),
                    Some(stored.path),
                )
            }
        };

        let model = account::ActiveModel {
            username: Set(details.username),
            email: Set(details.email),
            mobile: Set(details.mobile),
            password_hash: Set(hash_password(&details.password)?),
            role: Set(role),
            profile_image: Set(profile_image),
            address: Set(address),
            emergency_contact_email: Set(None),
            is_approved: Set(role != AccountRole::Volunteer),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
            ..Default::default()
        };

        let created = match self.account_repo.create(model).await {
            Ok(created) => created,
            Err(e) => {
                if let Some(key) = stored_key {
                    if let Err(cleanup) = self.storage.delete(&key).await {
                        tracing::warn!(%key, error = %cleanup, "Failed to remove orphaned upload");
                    }
                }
                return Err(match e {
                    AppError::Conflict(_) => AppError::Conflict(DUPLICATE_ACCOUNT.to_string()),
                    other => other,
                });
            }
        };

        tracing::info!(
            account_id = created.id,
            role = role.as_str(),
            "Account created"
        );

        Ok(SignupOutcome {
            user_id: created.id,
            role: created.role,
        })
    }

    /// Check credentials and the approval gate.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<LoginView> {
        let account = self
            .account_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::BadRequest(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(password, &account.password_hash)? {
            return Err(AppError::BadRequest(INVALID_CREDENTIALS.to_string()));
        }

        if account.role == AccountRole::Volunteer && !account.is_approved {
            return Err(AppError::Forbidden(PENDING_APPROVAL.to_string()));
        }

        Ok(account.into())
    }

    /// Set (or leave) the emergency contact address.
    pub async fn update_emergency_contact(
        &self,
        account_id: i32,
        emergency_contact_email: Option<String>,
    ) -> AppResult<()> {
        let current = self.account_repo.get_by_id(account_id).await?;

        let Some(contact) = emergency_contact_email else {
            return Ok(());
        };
        if !contact.validate_email() {
            return Err(AppError::Validation(
                "emergency_contact_email: invalid email address".to_string(),
            ));
        }

        let mut model = current.into_active_model();
        model.emergency_contact_email = Set(Some(contact));
        model.updated_at = Set(Some(Utc::now().into()));
        self.account_repo.update(model).await?;
        Ok(())
    }

    /// Apply profile changes, re-checking uniqueness against other accounts.
    pub async fn update_profile(&self, update: ProfileUpdate) -> AppResult<ProfileView> {
        let id = update.account_id;
        let current = self.account_repo.get_by_id(id).await?;
        let mut model = current.into_active_model();

        if let Some(username) = update.username.filter(|u| !u.is_empty()) {
            if self.account_repo.username_taken_by_other(&username, id).await? {
                return Err(AppError::Conflict("Username already taken".to_string()));
            }
            model.username = Set(username);
        }

        if let Some(email) = update.email.filter(|e| !e.is_empty()) {
            if self.account_repo.email_taken_by_other(&email, id).await? {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
            model.email = Set(email);
        }

        if let Some(address) = update.address.filter(|a| !a.is_empty()) {
            model.address = Set(Some(address));
        }

        if let Some(image) = update.image.filter(UploadedImage::is_present) {
            let key = format!("profile_{id}_{}", sanitize_filename(&image.file_name));
            let stored = self.storage.store(&key, &image.data).await?;
            model.profile_image = Set(Some(stored.path));
        }

        model.updated_at = Set(Some(Utc::now().into()));
        let updated = self.account_repo.update(model).await?;
        tracing::info!(account_id = id, "Profile updated");

        Ok(updated.into())
    }

    /// Approve a volunteer. Re-approving is allowed.
    pub async fn approve(&self, account_id: i32) -> AppResult<account::Model> {
        let current = self.account_repo.get_by_id(account_id).await?;
        if current.role != AccountRole::Volunteer {
            return Err(AppError::BadRequest(
                "Only volunteers need approval".to_string(),
            ));
        }

        let mut model = current.into_active_model();
        model.is_approved = Set(true);
        model.updated_at = Set(Some(Utc::now().into()));
        let approved = self.account_repo.update(model).await?;

        tracing::info!(account_id, "Volunteer approved");
        Ok(approved)
    }

    /// Remove an account and its incident footprint.
    pub async fn delete_account(&self, account_id: i32) -> AppResult<()> {
        self.account_repo.get_by_id(account_id).await?;
        self.account_repo.delete_with_cascade(account_id).await
    }

    /// Every account, password hashes excluded by serialization.
    pub async fn list_raw(&self) -> AppResult<Vec<account::Model>> {
        self.account_repo.list_all().await
    }
}

/// Hash a password.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored PHC string.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
