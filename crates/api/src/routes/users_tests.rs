//! HTTP tests for the user session routes
//!
//! Tests cover:
//! - Registration (cookie attributes, sanitized body, duplicates)
//! - Login failures and the shared error wording
//! - Refresh rotation, logout and single-slot invalidation
//! - Guarded routes and persistence failures

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;
use volunteerhub_shared::{
    MemorySubjectStore, NewSubject, Role, StoreError, StoreResult, Subject, SubjectFilter,
    SubjectStore,
};

use crate::{
    auth::JwtManager, config::test_config, routes::create_router, state::AppState,
};

// =============================================================================
// Helpers
// =============================================================================

fn app() -> Router {
    app_with(Arc::new(MemorySubjectStore::new()))
}

fn app_with(store: Arc<dyn SubjectStore>) -> Router {
    create_router(AppState::new(store, test_config()).unwrap())
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string())
}

/// `refreshToken=<value>` pair from a Set-Cookie header
fn cookie_pair(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap().to_string()
}

fn ann() -> Value {
    json!({
        "id": "u1",
        "name": "Ann",
        "email": "Ann@X.com",
        "password": "secret123"
    })
}

async fn register_ann(app: &Router) -> (String, String) {
    let response = send(app, json_request(Method::POST, "/api/v1/users/register", ann())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = cookie_pair(&set_cookie(&response).unwrap());
    let body = body_json(response).await;
    (body["accessToken"].as_str().unwrap().to_string(), cookie)
}

async fn login(app: &Router, email: &str, password: &str) -> Response {
    send(
        app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            json!({ "email": email, "password": password }),
        ),
    )
    .await
}

fn refresh_request(cookie: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/refresh-token")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn authed(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

/// Store whose every operation fails
struct FailingStore;

#[async_trait]
impl SubjectStore for FailingStore {
    async fn find_one(&self, _filter: &SubjectFilter) -> StoreResult<Option<Subject>> {
        Err(StoreError::Corrupt("storage offline".to_string()))
    }

    async fn create(&self, _subject: NewSubject) -> StoreResult<Subject> {
        Err(StoreError::Corrupt("storage offline".to_string()))
    }

    async fn save(&self, _subject: &Subject) -> StoreResult<()> {
        Err(StoreError::Corrupt("storage offline".to_string()))
    }

    async fn set_refresh_token(&self, _id: Uuid, _token: Option<&str>) -> StoreResult<()> {
        Err(StoreError::Corrupt("storage offline".to_string()))
    }
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_scenario() {
    let app = app();

    let response = send(&app, json_request(Method::POST, "/api/v1/users/register", ann())).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = set_cookie(&response).unwrap();
    assert!(cookie.starts_with("refreshToken="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Max-Age=2592000"));
    // Development config
    assert!(!cookie.contains("Secure"));

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ann@x.com");
    assert_eq!(body["user"]["role"], "volunteer");
    assert_eq!(body["user"]["id"], "u1");
    assert!(body["accessToken"].as_str().is_some());

    let user = body["user"].as_object().unwrap();
    for secret in ["password", "password_hash", "passwordHash", "refreshToken", "refresh_token"] {
        assert!(!user.contains_key(secret), "view leaked {}", secret);
    }
}

#[tokio::test]
async fn test_register_accepts_organization_alias() {
    let app = app();
    let mut body = ann();
    body["role"] = json!("NGO");

    let response = send(&app, json_request(Method::POST, "/api/v1/users/register", body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["user"]["role"], "organization");
}

#[tokio::test]
async fn test_register_missing_field() {
    let app = app();
    let mut body = ann();
    body["name"] = json!("   ");

    let response = send(&app, json_request(Method::POST, "/api/v1/users/register", body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookie(&response).is_none());

    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["error"], "All required fields must be provided");
}

#[tokio::test]
async fn test_register_duplicate_email_any_case() {
    let app = app();
    register_ann(&app).await;

    let mut body = ann();
    body["id"] = json!("u2");
    body["email"] = json!("ANN@x.COM");

    let response = send(&app, json_request(Method::POST, "/api/v1/users/register", body)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], 409);
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_sets_seven_day_cookie() {
    let app = app();
    register_ann(&app).await;

    let response = login(&app, "ann@x.com", "secret123").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).unwrap().contains("Max-Age=604800"));

    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "ann@x.com");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let app = app();
    register_ann(&app).await;

    let response = login(&app, "ann@x.com", "secret124").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response).is_none());
    assert_eq!(body_json(response).await["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_unknown_email_same_wording() {
    let app = app();

    let response = login(&app, "nobody@x.com", "secret123").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(set_cookie(&response).is_none());
    assert_eq!(body_json(response).await["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_missing_credentials() {
    let app = app();

    let response = send(
        &app,
        json_request(Method::POST, "/api/v1/users/login", json!({ "email": "ann@x.com" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Email and password are required"
    );
}

// =============================================================================
// Request bodies
// =============================================================================

#[tokio::test]
async fn test_malformed_json_uses_error_body() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"id\": \"u1\", "))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookie(&response).is_none());

    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_missing_content_type_uses_error_body() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/login")
        .body(Body::from(json!({ "email": "a@x.com", "password": "p" }).to_string()))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 400);
}

#[tokio::test]
async fn test_wrong_field_type_uses_error_body() {
    let app = app();
    let mut body = ann();
    body["skills"] = json!("not-a-list");

    let response = send(&app, json_request(Method::POST, "/api/v1/users/register", body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], 400);
}

#[tokio::test]
async fn test_unauthenticated_update_rejected_before_body() {
    let app = app();
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/api/v1/users/me")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("not json"))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], 401);
}

// =============================================================================
// Refresh and logout
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_cookie() {
    let app = app();
    let (_, cookie) = register_ann(&app).await;

    let response = send(&app, refresh_request(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = cookie_pair(&set_cookie(&response).unwrap());
    assert_ne!(rotated, cookie);
    assert!(body_json(response).await["accessToken"].as_str().is_some());

    // The old token was spent by the rotation
    let replay = send(&app, refresh_request(&cookie)).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_without_cookie() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/refresh-token")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_then_refresh_fails() {
    let app = app();
    let (access_token, cookie) = register_ann(&app).await;

    let response = send(&app, authed(Method::POST, "/api/v1/users/logout", &access_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie(&response).unwrap();
    assert!(cleared.starts_with("refreshToken="));
    assert!(cleared.contains("Max-Age=0"));

    let response = send(&app, refresh_request(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_requires_token() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/logout")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], 401);
}

#[tokio::test]
async fn test_second_login_invalidates_first_refresh_cookie() {
    let app = app();
    register_ann(&app).await;

    let first = login(&app, "ann@x.com", "secret123").await;
    let first_cookie = cookie_pair(&set_cookie(&first).unwrap());
    let second = login(&app, "ann@x.com", "secret123").await;
    let second_cookie = cookie_pair(&set_cookie(&second).unwrap());

    assert_eq!(
        send(&app, refresh_request(&first_cookie)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        send(&app, refresh_request(&second_cookie)).await.status(),
        StatusCode::OK
    );
}

// =============================================================================
// Guarded routes
// =============================================================================

#[tokio::test]
async fn test_profile_returns_claims() {
    let app = app();
    let (access_token, _) = register_ann(&app).await;

    let response = send(&app, authed(Method::GET, "/api/v1/users/profile", &access_token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["message"], "Authenticated user");
    assert_eq!(body["user"]["email"], "ann@x.com");
    assert_eq!(body["user"]["id"], "u1");
    assert_eq!(body["user"]["role"], "volunteer");
}

#[tokio::test]
async fn test_profile_rejects_expired_token() {
    let app = app();
    let jwt = JwtManager::from_config(&test_config());
    let subject = NewSubject {
        external_id: "u1".to_string(),
        name: "Ann".to_string(),
        email: "ann@x.com".to_string(),
        password_hash: "unused".to_string(),
        role: Role::Volunteer,
        skills: Vec::new(),
        location: String::new(),
        bio: String::new(),
        organisation_name: None,
        organization_description: None,
        website_url: None,
    }
    .into_subject(Uuid::new_v4(), OffsetDateTime::now_utc());

    let issued_at = OffsetDateTime::now_utc() - Duration::days(2);
    let expired = jwt.generate_access_token_at(&subject, issued_at).unwrap();

    let response = send(&app, authed(Method::GET, "/api/v1/users/profile", &expired)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Token has expired");
}

#[tokio::test]
async fn test_profile_rejects_refresh_token_as_bearer() {
    let app = app();
    let (_, cookie) = register_ann(&app).await;
    let refresh_token = cookie.trim_start_matches("refreshToken=").to_string();

    let response = send(&app, authed(Method::GET, "/api/v1/users/profile", &refresh_token)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_me_password_change_clears_session() {
    let app = app();
    let (access_token, cookie) = register_ann(&app).await;

    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/api/v1/users/me")
        .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "password": "newpass456", "currentPassword": "secret123" }).to_string(),
        ))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).unwrap().contains("Max-Age=0"));

    assert_eq!(
        send(&app, refresh_request(&cookie)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        login(&app, "ann@x.com", "newpass456").await.status(),
        StatusCode::OK
    );
}

// =============================================================================
// Persistence failures
// =============================================================================

#[tokio::test]
async fn test_store_failure_is_internal_error() {
    let app = app_with(Arc::new(FailingStore));

    let response = send(&app, json_request(Method::POST, "/api/v1/users/register", ann())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(set_cookie(&response).is_none());

    let body = body_json(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(body["code"], 500);

    let response = login(&app, "ann@x.com", "secret123").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
