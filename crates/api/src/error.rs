//! API error type
//!
//! Every failure surfaces as a status code plus a JSON body
//! `{"error": <message>, "code": <status>}`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use volunteerhub_shared::StoreError;

use crate::auth::{password::PasswordError, TokenError};

/// Shared public wording for unknown email and wrong password
pub const INVALID_LOGIN_MESSAGE: &str = "Invalid email or password";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("User with this ID or email already exists")]
    DuplicateSubject,
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Subject not found")]
    SubjectNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Unauthenticated: {0}")]
    Unauthenticated(&'static str),
    #[error("Persistence failure: {0}")]
    Persistence(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MissingCredentials => StatusCode::BAD_REQUEST,
            ApiError::DuplicateSubject => StatusCode::CONFLICT,
            ApiError::SubjectNotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidCredentials | ApiError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Persistence(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to clients
    fn public_message(&self) -> String {
        match self {
            // Same wording for both so responses don't reveal which emails exist
            ApiError::SubjectNotFound | ApiError::InvalidCredentials => {
                INVALID_LOGIN_MESSAGE.to_string()
            }
            ApiError::Unauthenticated(reason) => (*reason).to_string(),
            ApiError::Persistence(_) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::Persistence(detail) | ApiError::Internal(detail) => {
                tracing::error!(status = status.as_u16(), error = %detail, "Request failed");
            }
            _ => {
                tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
            }
        }

        let body = Json(json!({
            "error": self.public_message(),
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate { .. } => ApiError::DuplicateSubject,
            other => ApiError::Persistence(other.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(e: PasswordError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Encoding(detail) => ApiError::Internal(detail),
            TokenError::Expired => ApiError::Unauthenticated("Token has expired"),
            TokenError::InvalidSignature | TokenError::Malformed => {
                ApiError::Unauthenticated("Invalid token")
            }
        }
    }
}
