//! Authentication guard for Axum
//!
//! Verification is stateless: an access token is accepted purely on its
//! signature and expiry, without a store lookup. [`require_auth`] rejects
//! unauthenticated requests before the handler runs; handlers that need the
//! subject take [`AuthUser`] as an explicit extractor argument.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;
use volunteerhub_shared::Role;

use super::jwt::{Claims, JwtManager, TokenError};

/// Cookie clients may use to carry the access token instead of a header
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Authenticated subject resolved from a verified access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    #[serde(rename = "_id")]
    pub subject_id: Uuid,
    #[serde(rename = "id")]
    pub external_id: String,
    pub email: String,
    pub role: Role,
    /// Access token expiry (unix seconds)
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.sub,
            external_id: claims.id,
            email: claims.email,
            role: claims.role,
            expires_at: claims.exp,
        }
    }
}

/// State needed for authentication
#[derive(Clone)]
pub struct AuthState {
    pub jwt_manager: JwtManager,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token is malformed")]
    MalformedToken,
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            TokenError::Malformed | TokenError::Encoding(_) => AuthError::MalformedToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuth => "Authentication required",
            AuthError::ExpiredToken => "Token has expired",
            AuthError::InvalidSignature | AuthError::MalformedToken => "Invalid token",
        };
        let status = StatusCode::UNAUTHORIZED;

        let body = Json(json!({
            "error": message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Extract bearer token from the Authorization header, falling back to the
/// access-token cookie
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(header) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Some(token) = header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    CookieJar::from_headers(headers)
        .get(ACCESS_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

/// Verify the access token carried by `headers`
pub fn authenticate(jwt_manager: &JwtManager, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
    let token = extract_bearer_token(headers).ok_or(AuthError::MissingAuth)?;
    let claims = jwt_manager.validate_access_token(&token)?;
    Ok(AuthUser::from(claims))
}

/// Middleware that requires a valid access token
pub async fn require_auth(
    State(auth_state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    match authenticate(&auth_state.jwt_manager, request.headers()) {
        Ok(auth_user) => {
            tracing::debug!(
                path = %path,
                user_id = %auth_user.subject_id,
                role = %auth_user.role,
                "require_auth: authentication successful"
            );
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = ?err, "require_auth: authentication failed");
            err.into_response()
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        authenticate(&auth_state.jwt_manager, &parts.headers)
    }
}
