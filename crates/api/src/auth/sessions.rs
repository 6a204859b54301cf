//! Session lifecycle: register, login, refresh, logout
//!
//! Each subject has a single refresh-token slot. Every successful login or
//! refresh overwrites it (invalidating whatever was there), logout and a
//! password change clear it. Access tokens are never stored.

use std::sync::Arc;

use serde::Deserialize;
use subtle::ConstantTimeEq;
use time::Duration;
use volunteerhub_shared::{
    normalize_email, NewSubject, Role, StoreError, Subject, SubjectFilter, SubjectStore,
    SubjectView,
};

use super::jwt::JwtManager;
use super::middleware::AuthUser;
use super::password::{
    generate_impossible_hash, spawn_hash_password, spawn_verify_password, PasswordError,
};
use crate::error::{ApiError, ApiResult};

const REQUIRED_FIELDS_MESSAGE: &str = "All required fields must be provided";

/// Registration request body
#[derive(Default, Deserialize)]
pub struct Registration {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub skills: Option<Vec<String>>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub organisation_name: Option<String>,
    pub organization_description: Option<String>,
    pub website_url: Option<String>,
}

/// Login request body
#[derive(Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Partial profile update. Absent fields are left untouched.
#[derive(Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub skills: Option<Vec<String>>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub organisation_name: Option<String>,
    pub organization_description: Option<String>,
    pub website_url: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "currentPassword")]
    pub current_password: Option<String>,
}

/// Tokens and sanitized subject handed back after register, login or refresh
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub subject: SubjectView,
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the refresh token, also used as the cookie max-age
    pub refresh_max_age: Duration,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SubjectStore>,
    jwt_manager: JwtManager,
    registration_refresh_ttl: Duration,
    /// Verified against when a login email is unknown
    dummy_hash: Arc<str>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn SubjectStore>,
        jwt_manager: JwtManager,
        registration_refresh_ttl: Duration,
    ) -> Result<Self, PasswordError> {
        let dummy_hash = generate_impossible_hash()?;

        Ok(Self {
            store,
            jwt_manager,
            registration_refresh_ttl,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub fn jwt_manager(&self) -> &JwtManager {
        &self.jwt_manager
    }

    /// Create a subject and sign it in
    pub async fn register(&self, registration: Registration) -> ApiResult<IssuedSession> {
        let external_id = required(registration.id)?;
        let name = required(registration.name)?;
        let email = normalize_email(&required(registration.email)?);
        let password = registration
            .password
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ApiError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()))?;

        let role = match registration.role.as_deref().map(str::trim) {
            None | Some("") => Role::default(),
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| ApiError::Validation(e.to_string()))?,
        };

        let existing = self
            .store
            .find_one(&SubjectFilter::ExternalIdOrEmail {
                external_id: external_id.clone(),
                email: email.clone(),
            })
            .await?;
        if existing.is_some() {
            tracing::info!(external_id = %external_id, "Registration rejected: subject already exists");
            return Err(ApiError::DuplicateSubject);
        }

        let password_hash = spawn_hash_password(password).await?;

        let new_subject = NewSubject {
            external_id: external_id.clone(),
            name,
            email,
            password_hash,
            role,
            skills: registration.skills.unwrap_or_default(),
            location: registration
                .location
                .map(|l| l.trim().to_string())
                .unwrap_or_default(),
            bio: registration.bio.unwrap_or_default(),
            organisation_name: registration.organisation_name,
            organization_description: registration.organization_description,
            website_url: registration.website_url,
        };

        // A concurrent registration can win between the lookup and here; the
        // store's uniqueness check is what actually decides.
        let created = self.store.create(new_subject).await?;

        let subject = self
            .store
            .find_one(&SubjectFilter::ExternalId(external_id))
            .await?
            .ok_or_else(|| {
                ApiError::Persistence("Something went wrong while registering the user".to_string())
            })?;

        let session = self
            .issue(&subject, self.registration_refresh_ttl)
            .await?;

        tracing::info!(user_id = %created.id, role = %subject.role, "Subject registered");

        Ok(session)
    }

    /// Verify credentials and start a new session, replacing any previous one
    pub async fn login(&self, request: LoginRequest) -> ApiResult<IssuedSession> {
        let (email, password) = match (request.email, request.password) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                (normalize_email(&email), password)
            }
            _ => return Err(ApiError::MissingCredentials),
        };

        let subject = match self.store.find_one(&SubjectFilter::Email(email)).await? {
            Some(subject) => subject,
            None => {
                // Spend the same verification cost as a real mismatch
                let _ = spawn_verify_password(password, self.dummy_hash.to_string()).await;
                tracing::info!("Login failed: unknown email");
                return Err(ApiError::SubjectNotFound);
            }
        };

        if !spawn_verify_password(password, subject.password_hash.clone()).await {
            tracing::info!(user_id = %subject.id, "Login failed: wrong password");
            return Err(ApiError::InvalidCredentials);
        }

        let session = self
            .issue(&subject, self.jwt_manager.refresh_ttl())
            .await?;

        tracing::info!(user_id = %subject.id, "Login successful");

        Ok(session)
    }

    /// Exchange the presented refresh token for a fresh token pair
    ///
    /// The presented token must match the persisted slot exactly, so a token
    /// from before a logout, a password change or a newer login is refused.
    pub async fn refresh(&self, presented: Option<&str>) -> ApiResult<IssuedSession> {
        let presented = presented
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthenticated("Refresh token is required"))?;

        let claims = self
            .jwt_manager
            .validate_refresh_token(presented)
            .map_err(|e| {
                tracing::debug!(error = %e, "Refresh token rejected");
                ApiError::Unauthenticated("Invalid refresh token")
            })?;

        let subject = self
            .store
            .find_one(&SubjectFilter::Id(claims.sub))
            .await?
            .ok_or(ApiError::Unauthenticated("Invalid refresh token"))?;

        let matches = subject
            .refresh_token
            .as_deref()
            .map(|stored| bool::from(stored.as_bytes().ct_eq(presented.as_bytes())))
            .unwrap_or(false);

        if !matches {
            tracing::warn!(user_id = %subject.id, "Refresh token does not match the current session");
            return Err(ApiError::Unauthenticated("Refresh token is expired or used"));
        }

        let session = self
            .issue(&subject, self.jwt_manager.refresh_ttl())
            .await?;

        tracing::debug!(user_id = %subject.id, "Session refreshed");

        Ok(session)
    }

    /// Clear the persisted refresh token
    pub async fn logout(&self, user: &AuthUser) -> ApiResult<()> {
        match self.store.set_refresh_token(user.subject_id, None).await {
            Ok(()) => {}
            // Deleted subject: nothing left to invalidate
            Err(StoreError::NotFound) => {
                tracing::warn!(user_id = %user.subject_id, "Logout for a subject that no longer exists");
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %user.subject_id, "Logged out");
        Ok(())
    }

    /// Apply a profile update for the authenticated subject
    ///
    /// The password digest is only rewritten when a new password is part of
    /// the update, and only after the current password checks out.
    pub async fn update_subject(
        &self,
        user: &AuthUser,
        update: ProfileUpdate,
    ) -> ApiResult<SubjectView> {
        let mut subject = self
            .store
            .find_one(&SubjectFilter::Id(user.subject_id))
            .await?
            .ok_or(ApiError::Unauthenticated("Subject no longer exists"))?;

        if let Some(name) = update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ApiError::Validation("Name cannot be empty".to_string()));
            }
            subject.name = name.to_string();
        }
        if let Some(skills) = update.skills {
            subject.skills = skills;
        }
        if let Some(location) = update.location {
            subject.location = location.trim().to_string();
        }
        if let Some(bio) = update.bio {
            subject.bio = bio;
        }
        if update.organisation_name.is_some() {
            subject.organisation_name = update.organisation_name;
        }
        if update.organization_description.is_some() {
            subject.organization_description = update.organization_description;
        }
        if update.website_url.is_some() {
            subject.website_url = update.website_url;
        }

        let password_changed = match update.password {
            Some(new_password) => {
                if new_password.trim().is_empty() {
                    return Err(ApiError::Validation("Password cannot be empty".to_string()));
                }
                let current = update.current_password.unwrap_or_default();
                if !spawn_verify_password(current, subject.password_hash.clone()).await {
                    tracing::info!(user_id = %subject.id, "Password change rejected: wrong current password");
                    return Err(ApiError::InvalidCredentials);
                }
                subject.password_hash = spawn_hash_password(new_password).await?;
                true
            }
            None => false,
        };

        // save() never writes the refresh-token slot, so a logout or login
        // that lands while this update runs is not undone here
        self.store.save(&subject).await?;

        if password_changed {
            self.store.set_refresh_token(subject.id, None).await?;
            tracing::info!(user_id = %subject.id, "Password changed, session invalidated");
        } else {
            tracing::debug!(user_id = %subject.id, "Profile updated");
        }

        let updated = self
            .store
            .find_one(&SubjectFilter::Id(subject.id))
            .await?
            .ok_or(ApiError::Unauthenticated("Subject no longer exists"))?;

        Ok(updated.view())
    }

    /// Mint both tokens and persist the refresh token in the subject's slot
    async fn issue(&self, subject: &Subject, refresh_ttl: Duration) -> ApiResult<IssuedSession> {
        let access_token = self.jwt_manager.generate_access_token(subject)?;
        let refresh_token = self
            .jwt_manager
            .generate_refresh_token(subject.id, refresh_ttl)?;

        self.store
            .set_refresh_token(subject.id, Some(&refresh_token))
            .await?;

        Ok(IssuedSession {
            subject: subject.view(),
            access_token,
            refresh_token,
            refresh_max_age: refresh_ttl,
        })
    }
}

fn required(value: Option<String>) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(REQUIRED_FIELDS_MESSAGE.to_string()))
}
