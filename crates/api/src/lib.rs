// API crate clippy configuration
#![allow(clippy::needless_borrows_for_generic_args)] // Sometimes needed for clarity
// Test code patterns:
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! VolunteerHub API Library
//!
//! Credential hashing, token issuing, session management and the
//! authentication guard, plus the HTTP routes exposing them.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
