//! API routes

pub mod users;
#[cfg(test)]
mod users_tests;

use axum::{
    extract::FromRequest,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{auth::require_auth, error::ApiError, state::AppState};

/// `Json` extractor whose rejections use the API error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    // Routes that require a valid access token. The layer is the gate, so no
    // body is parsed for an unauthenticated call; handlers still re-verify
    // through the AuthUser extractor to receive the subject explicitly.
    let protected_routes = Router::new()
        .route("/logout", post(users::logout))
        .route("/profile", get(users::profile))
        .route("/me", patch(users::update_me))
        .route_layer(middleware::from_fn_with_state(
            state.auth_state(),
            require_auth,
        ));

    let user_routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/refresh-token", post(users::refresh_token))
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/users", user_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
