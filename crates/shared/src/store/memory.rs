//! In-memory subject store for tests and local development

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, StoreResult, SubjectFilter, SubjectStore};
use crate::subject::{NewSubject, Subject};

/// Thread-safe map of subjects keyed by internal id
#[derive(Clone, Default)]
pub struct MemorySubjectStore {
    subjects: Arc<RwLock<HashMap<Uuid, Subject>>>,
}

impl MemorySubjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.subjects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subjects.read().await.is_empty()
    }
}

fn matches_filter(subject: &Subject, filter: &SubjectFilter) -> bool {
    match filter {
        SubjectFilter::Id(id) => subject.id == *id,
        SubjectFilter::ExternalId(external_id) => subject.external_id == *external_id,
        SubjectFilter::Email(email) => subject.email == *email,
        SubjectFilter::ExternalIdOrEmail { external_id, email } => {
            subject.external_id == *external_id || subject.email == *email
        }
    }
}

/// First unique field of `candidate` already used by another subject
fn conflicting_field<'a>(
    mut others: impl Iterator<Item = &'a Subject>,
    candidate: &Subject,
) -> Option<&'static str> {
    others.find_map(|existing| {
        if existing.id == candidate.id {
            None
        } else if existing.external_id == candidate.external_id {
            Some("external_id")
        } else if existing.email == candidate.email {
            Some("email")
        } else {
            None
        }
    })
}

#[async_trait]
impl SubjectStore for MemorySubjectStore {
    async fn find_one(&self, filter: &SubjectFilter) -> StoreResult<Option<Subject>> {
        let subjects = self.subjects.read().await;
        Ok(subjects.values().find(|s| matches_filter(s, filter)).cloned())
    }

    async fn create(&self, subject: NewSubject) -> StoreResult<Subject> {
        let subject = subject.into_subject(Uuid::new_v4(), OffsetDateTime::now_utc());

        // Check and insert under one write lock
        let mut subjects = self.subjects.write().await;
        if let Some(field) = conflicting_field(subjects.values(), &subject) {
            return Err(StoreError::Duplicate { field });
        }
        subjects.insert(subject.id, subject.clone());

        Ok(subject)
    }

    async fn save(&self, subject: &Subject) -> StoreResult<()> {
        let mut subjects = self.subjects.write().await;
        if let Some(field) = conflicting_field(subjects.values(), subject) {
            return Err(StoreError::Duplicate { field });
        }
        let stored = subjects.get_mut(&subject.id).ok_or(StoreError::NotFound)?;

        // The refresh-token slot is only written through set_refresh_token
        let refresh_token = stored.refresh_token.take();
        *stored = Subject {
            refresh_token,
            updated_at: OffsetDateTime::now_utc(),
            ..subject.clone()
        };

        Ok(())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> StoreResult<()> {
        let mut subjects = self.subjects.write().await;
        let subject = subjects.get_mut(&id).ok_or(StoreError::NotFound)?;
        subject.refresh_token = token.map(String::from);
        subject.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }
}
