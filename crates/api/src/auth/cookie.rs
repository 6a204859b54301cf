//! Refresh token session cookie

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Build the session cookie carrying `token` for `max_age`
pub fn refresh_cookie(token: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Expired, empty session cookie that makes the client drop the current one
///
/// Path must match the one set by [`refresh_cookie`] or the browser keeps it.
pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::now_utc() - Duration::days(365))
        .build()
}
