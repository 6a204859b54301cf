//! PostgreSQL subject store

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{StoreError, StoreResult, SubjectFilter, SubjectStore};
use crate::subject::{NewSubject, Role, Subject};

/// PostgreSQL SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

const SUBJECT_COLUMNS: &str = r#"
    id, external_id, name, email, password_hash, refresh_token, role, skills,
    location, bio, organisation_name, organization_description, website_url,
    created_at, updated_at
"#;

/// Database row type for subject lookup
#[derive(Debug, FromRow)]
struct SubjectRow {
    id: Uuid,
    external_id: String,
    name: String,
    email: String,
    password_hash: String,
    refresh_token: Option<String>,
    role: String,
    skills: Vec<String>,
    location: String,
    bio: String,
    organisation_name: Option<String>,
    organization_description: Option<String>,
    website_url: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<SubjectRow> for Subject {
    type Error = StoreError;

    fn try_from(row: SubjectRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|e: crate::subject::InvalidRole| StoreError::Corrupt(e.to_string()))?;

        Ok(Subject {
            id: row.id,
            external_id: row.external_id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            refresh_token: row.refresh_token,
            role,
            skills: row.skills,
            location: row.location,
            bio: row.bio,
            organisation_name: row.organisation_name,
            organization_description: row.organization_description,
            website_url: row.website_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Translate unique-constraint violations into [`StoreError::Duplicate`]
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let field = match db.constraint() {
                Some("users_external_id_key") => "external_id",
                Some("users_email_key") => "email",
                _ => "unknown",
            };
            tracing::debug!(
                constraint = ?db.constraint(),
                field,
                "Unique constraint rejected subject write"
            );
            return StoreError::Duplicate { field };
        }
    }
    StoreError::Database(e)
}

/// Subject store backed by the `users` table
#[derive(Clone)]
pub struct PgSubjectStore {
    pool: PgPool,
}

impl PgSubjectStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubjectStore for PgSubjectStore {
    async fn find_one(&self, filter: &SubjectFilter) -> StoreResult<Option<Subject>> {
        let row: Option<SubjectRow> = match filter {
            SubjectFilter::Id(id) => {
                let sql = format!("SELECT {SUBJECT_COLUMNS} FROM users WHERE id = $1");
                sqlx::query_as(&sql)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            SubjectFilter::ExternalId(external_id) => {
                let sql = format!("SELECT {SUBJECT_COLUMNS} FROM users WHERE external_id = $1");
                sqlx::query_as(&sql)
                    .bind(external_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            SubjectFilter::Email(email) => {
                let sql = format!("SELECT {SUBJECT_COLUMNS} FROM users WHERE email = $1");
                sqlx::query_as(&sql)
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await?
            }
            SubjectFilter::ExternalIdOrEmail { external_id, email } => {
                let sql = format!(
                    "SELECT {SUBJECT_COLUMNS} FROM users WHERE external_id = $1 OR email = $2 LIMIT 1"
                );
                sqlx::query_as(&sql)
                    .bind(external_id)
                    .bind(email)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        row.map(Subject::try_from).transpose()
    }

    async fn create(&self, subject: NewSubject) -> StoreResult<Subject> {
        let subject = subject.into_subject(Uuid::new_v4(), OffsetDateTime::now_utc());

        let sql = format!(
            r#"
            INSERT INTO users (
                id, external_id, name, email, password_hash, role, skills,
                location, bio, organisation_name, organization_description, website_url,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING {SUBJECT_COLUMNS}
            "#
        );
        let row: SubjectRow = sqlx::query_as(&sql)
            .bind(subject.id)
            .bind(&subject.external_id)
            .bind(&subject.name)
            .bind(&subject.email)
            .bind(&subject.password_hash)
            .bind(subject.role.as_str())
            .bind(&subject.skills)
            .bind(&subject.location)
            .bind(&subject.bio)
            .bind(&subject.organisation_name)
            .bind(&subject.organization_description)
            .bind(&subject.website_url)
            .bind(subject.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(map_write_error)?;

        Subject::try_from(row)
    }

    async fn save(&self, subject: &Subject) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET name = $2,
                email = $3,
                password_hash = $4,
                role = $5,
                skills = $6,
                location = $7,
                bio = $8,
                organisation_name = $9,
                organization_description = $10,
                website_url = $11,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(subject.id)
        .bind(&subject.name)
        .bind(&subject.email)
        .bind(&subject.password_hash)
        .bind(subject.role.as_str())
        .bind(&subject.skills)
        .bind(&subject.location)
        .bind(&subject.bio)
        .bind(&subject.organisation_name)
        .bind(&subject.organization_description)
        .bind(&subject.website_url)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
