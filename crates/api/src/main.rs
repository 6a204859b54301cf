//! VolunteerHub API Server
//!
//! Registration, login, token refresh and logout for volunteers and
//! organizations.

use std::{net::SocketAddr, sync::Arc};

use axum::http::{header, HeaderValue, Method};
use axum::middleware;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use volunteerhub_api::{
    create_router, security::security_headers_middleware, AppState, Config,
};
use volunteerhub_shared::{
    create_pool, run_migrations, MemorySubjectStore, PgSubjectStore, SubjectStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,volunteerhub_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting VolunteerHub API Server v{}", env!("CARGO_PKG_VERSION"));

    // Missing or shared token secrets are fatal here
    let config = Config::from_env()?;
    tracing::info!(environment = ?config.environment, "Configuration loaded");

    let store: Arc<dyn SubjectStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(database_url).await?;
            tracing::info!("Database connection established");

            run_migrations(&pool).await?;

            Arc::new(PgSubjectStore::new(pool))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set - using the in-memory store, all data is lost on restart"
            );
            Arc::new(MemorySubjectStore::new())
        }
    };

    let state = AppState::new(store, config.clone())?;

    // Credentials (the refresh cookie) require an explicit origin list
    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    tracing::info!(
        allowed_origins = ?allowed_origins,
        "CORS configured with {} allowed origins",
        allowed_origins.len()
    );

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = create_router(state)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
