//! Subject persistence
//!
//! The session layer only talks to [`SubjectStore`]. Uniqueness of the
//! external id and email is enforced by the store itself (unique constraints
//! in PostgreSQL, a single write lock in memory), so a lookup before `create`
//! is an optimization and never the safety mechanism.

mod memory;
mod postgres;

pub use memory::MemorySubjectStore;
pub use postgres::PgSubjectStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::subject::{NewSubject, Subject};

/// Lookup criteria for [`SubjectStore::find_one`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectFilter {
    Id(Uuid),
    ExternalId(String),
    /// Expected to be normalized already
    Email(String),
    /// Matches a subject with either the external id or the email
    ExternalIdOrEmail { external_id: String, email: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate value for unique field '{field}'")]
    Duplicate { field: &'static str },
    #[error("Subject not found")]
    NotFound,
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Data-store collaborator for subject records
#[async_trait]
pub trait SubjectStore: Send + Sync {
    /// Find the first subject matching `filter`
    async fn find_one(&self, filter: &SubjectFilter) -> StoreResult<Option<Subject>>;

    /// Insert a new subject. Fails with [`StoreError::Duplicate`] when the
    /// external id or email is already taken.
    async fn create(&self, subject: NewSubject) -> StoreResult<Subject>;

    /// Persist every mutable field of `subject` except the refresh-token
    /// slot, and bump `updated_at`
    async fn save(&self, subject: &Subject) -> StoreResult<()>;

    /// Token-only update of the refresh-token slot
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()>;
}
