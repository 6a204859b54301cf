#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! VolunteerHub shared library
//!
//! Subject model and the data-store collaborator used by the API server.

pub mod db;
pub mod store;
pub mod subject;

pub use db::{create_pool, run_migrations};
pub use store::{
    MemorySubjectStore, PgSubjectStore, StoreError, StoreResult, SubjectFilter, SubjectStore,
};
pub use subject::{normalize_email, InvalidRole, NewSubject, Role, Subject, SubjectView};
