//! Application state

use std::sync::Arc;

use axum::extract::FromRef;
use volunteerhub_shared::SubjectStore;

use crate::{
    auth::{password::PasswordError, AuthState, JwtManager, SessionManager},
    config::Config,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn SubjectStore>,
    pub jwt_manager: JwtManager,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(store: Arc<dyn SubjectStore>, config: Config) -> Result<Self, PasswordError> {
        let jwt_manager = JwtManager::from_config(&config);
        tracing::info!(
            access_ttl_secs = config.access_token_expiry.whole_seconds(),
            refresh_ttl_secs = config.refresh_token_expiry.whole_seconds(),
            registration_refresh_ttl_secs = config.registration_refresh_token_expiry.whole_seconds(),
            "Token issuer configured"
        );

        let sessions = SessionManager::new(
            Arc::clone(&store),
            jwt_manager.clone(),
            config.registration_refresh_token_expiry,
        )?;

        if config.is_production() {
            tracing::info!("Production mode: session cookies are marked Secure");
        } else {
            tracing::info!("Development mode: session cookies are not marked Secure");
        }

        Ok(Self {
            config,
            store,
            jwt_manager,
            sessions,
        })
    }

    /// Get auth state for middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
        }
    }

    /// Whether session cookies get the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.is_production()
    }
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth_state()
    }
}
