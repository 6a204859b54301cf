//! User session routes

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use serde_json::{json, Value};
use volunteerhub_shared::SubjectView;

use crate::{
    auth::{
        refresh_cookie, removal_cookie, AuthUser, IssuedSession, LoginRequest, ProfileUpdate,
        Registration, REFRESH_COOKIE_NAME,
    },
    error::ApiResult,
    routes::ApiJson,
    state::AppState,
};

/// Body returned by register, login and refresh
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: SubjectView,
    pub access_token: String,
}

/// Set the refresh cookie and build the response body for an issued session
fn session_response(
    state: &AppState,
    jar: CookieJar,
    session: IssuedSession,
) -> (CookieJar, Json<SessionResponse>) {
    let cookie = refresh_cookie(
        session.refresh_token,
        session.refresh_max_age,
        state.secure_cookies(),
    );

    (
        jar.add(cookie),
        Json(SessionResponse {
            user: session.subject,
            access_token: session.access_token,
        }),
    )
}

/// POST /api/v1/users/register
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<Registration>,
) -> ApiResult<(StatusCode, CookieJar, Json<SessionResponse>)> {
    let session = state.sessions.register(body).await?;
    let (jar, body) = session_response(&state, jar, session);
    Ok((StatusCode::CREATED, jar, body))
}

/// POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(body): ApiJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let session = state.sessions.login(body).await?;
    Ok(session_response(&state, jar, session))
}

/// POST /api/v1/users/refresh-token
pub async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<SessionResponse>)> {
    let presented = jar
        .get(REFRESH_COOKIE_NAME)
        .map(|cookie| cookie.value().to_string());

    let session = state.sessions.refresh(presented.as_deref()).await?;
    Ok(session_response(&state, jar, session))
}

/// POST /api/v1/users/logout
pub async fn logout(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<Value>)> {
    state.sessions.logout(&user).await?;

    Ok((
        jar.add(removal_cookie(state.secure_cookies())),
        Json(json!({ "message": "User logged out successfully" })),
    ))
}

/// GET /api/v1/users/profile
pub async fn profile(user: AuthUser) -> Json<Value> {
    Json(json!({
        "message": "Authenticated user",
        "user": user,
    }))
}

/// PATCH /api/v1/users/me
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    jar: CookieJar,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<(CookieJar, Json<Value>)> {
    let password_changed = update.password.is_some();
    let view = state.sessions.update_subject(&user, update).await?;

    // The stored refresh token is gone after a password change
    let jar = if password_changed {
        jar.add(removal_cookie(state.secure_cookies()))
    } else {
        jar
    };

    Ok((jar, Json(json!({ "user": view }))))
}
