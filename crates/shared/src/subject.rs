//! Subject (user credential record) model
//!
//! A subject is a registered volunteer or organization. The stored record
//! carries the password digest and the current refresh token; neither ever
//! leaves the backend. [`SubjectView`] is the only shape handed to clients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Role tag of a subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Volunteer,
    #[serde(alias = "NGO", alias = "ngo")]
    Organization,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Volunteer => "volunteer",
            Role::Organization => "organization",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid role '{0}'. Must be one of: volunteer, organization")]
pub struct InvalidRole(pub String);

impl FromStr for Role {
    type Err = InvalidRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "volunteer" => Ok(Role::Volunteer),
            // Legacy spelling used by older clients
            "organization" | "organisation" | "ngo" => Ok(Role::Organization),
            _ => Err(InvalidRole(s.to_string())),
        }
    }
}

/// Normalize an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Persisted subject record
#[derive(Clone, PartialEq)]
pub struct Subject {
    /// Internal identifier, embedded in tokens as `sub`
    pub id: Uuid,
    /// Client-supplied identifier, unique and case-sensitive
    pub external_id: String,
    pub name: String,
    /// Always lowercase
    pub email: String,
    /// PHC-formatted digest; the plaintext is never stored
    pub password_hash: String,
    /// Current refresh token (single slot)
    pub refresh_token: Option<String>,
    pub role: Role,
    pub skills: Vec<String>,
    pub location: String,
    pub bio: String,
    pub organisation_name: Option<String>,
    pub organization_description: Option<String>,
    pub website_url: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Subject {
    /// Client-safe projection without the password digest or refresh token
    pub fn view(&self) -> SubjectView {
        SubjectView::from(self)
    }
}

// Digest and token are redacted so a stray `?subject` in a log line stays harmless.
impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("id", &self.id)
            .field("external_id", &self.external_id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("role", &self.role)
            .field("skills", &self.skills)
            .field("location", &self.location)
            .field("bio", &self.bio)
            .field("organisation_name", &self.organisation_name)
            .field("organization_description", &self.organization_description)
            .field("website_url", &self.website_url)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields needed to create a subject. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewSubject {
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub skills: Vec<String>,
    pub location: String,
    pub bio: String,
    pub organisation_name: Option<String>,
    pub organization_description: Option<String>,
    pub website_url: Option<String>,
}

impl NewSubject {
    /// Materialize the record a store will persist
    pub fn into_subject(self, id: Uuid, now: OffsetDateTime) -> Subject {
        Subject {
            id,
            external_id: self.external_id,
            name: self.name,
            email: normalize_email(&self.email),
            password_hash: self.password_hash,
            refresh_token: None,
            role: self.role,
            skills: self.skills,
            location: self.location,
            bio: self.bio,
            organisation_name: self.organisation_name,
            organization_description: self.organization_description,
            website_url: self.website_url,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Sanitized subject returned by register/login and profile updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "id")]
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub skills: Vec<String>,
    pub location: String,
    pub bio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organisation_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Subject> for SubjectView {
    fn from(subject: &Subject) -> Self {
        Self {
            id: subject.id,
            external_id: subject.external_id.clone(),
            name: subject.name.clone(),
            email: subject.email.clone(),
            role: subject.role,
            skills: subject.skills.clone(),
            location: subject.location.clone(),
            bio: subject.bio.clone(),
            organisation_name: subject.organisation_name.clone(),
            organization_description: subject.organization_description.clone(),
            website_url: subject.website_url.clone(),
            created_at: subject.created_at,
            updated_at: subject.updated_at,
        }
    }
}
