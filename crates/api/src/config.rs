//! Server configuration loaded from the environment
//!
//! Token secrets have no defaults: a missing secret is a startup error, never
//! a fall back to a well-known value.

use std::fmt;

use time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
const DEFAULT_ACCESS_TOKEN_EXPIRY: &str = "1d";
const DEFAULT_REFRESH_TOKEN_EXPIRY: &str = "7d";
const DEFAULT_REGISTRATION_REFRESH_TOKEN_EXPIRY: &str = "30d";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// Longest accepted token lifetime
pub const MAX_TOKEN_TTL: Duration = Duration::days(365);

/// Secrets shorter than this are accepted but logged as weak
const RECOMMENDED_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingSecret(&'static str),
    #[error("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ")]
    SharedSecret,
    #[error("{var} has an invalid duration '{value}' (expected e.g. 15m, 12h, 7d or seconds, at most 365d)")]
    InvalidDuration { var: &'static str, value: String },
}

/// Deployment environment, controls the `secure` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub bind_address: String,
    /// When absent the server runs on the in-memory store
    pub database_url: Option<String>,
    pub environment: Environment,
    pub access_token_secret: String,
    pub access_token_expiry: Duration,
    pub refresh_token_secret: String,
    pub refresh_token_expiry: Duration,
    /// Refresh token (and cookie) lifetime issued on registration
    pub registration_refresh_token_expiry: Duration,
    pub allowed_origins: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<configured>"),
            )
            .field("environment", &self.environment)
            .field("access_token_secret", &"<redacted>")
            .field("access_token_expiry", &self.access_token_expiry)
            .field("refresh_token_secret", &"<redacted>")
            .field("refresh_token_expiry", &self.refresh_token_expiry)
            .field(
                "registration_refresh_token_expiry",
                &self.registration_refresh_token_expiry,
            )
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl Config {
    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let access_token_secret =
            var("ACCESS_TOKEN_SECRET").ok_or(ConfigError::MissingSecret("ACCESS_TOKEN_SECRET"))?;
        let refresh_token_secret = var("REFRESH_TOKEN_SECRET")
            .ok_or(ConfigError::MissingSecret("REFRESH_TOKEN_SECRET"))?;

        if access_token_secret == refresh_token_secret {
            return Err(ConfigError::SharedSecret);
        }

        for (name, secret) in [
            ("ACCESS_TOKEN_SECRET", &access_token_secret),
            ("REFRESH_TOKEN_SECRET", &refresh_token_secret),
        ] {
            if secret.len() < RECOMMENDED_SECRET_LEN {
                tracing::warn!(
                    variable = name,
                    length = secret.len(),
                    recommended = RECOMMENDED_SECRET_LEN,
                    "Token secret is shorter than recommended"
                );
            }
        }

        let duration = |key: &'static str, default: &str| {
            let value = var(key).unwrap_or_else(|| default.to_string());
            parse_expiry(&value).ok_or(ConfigError::InvalidDuration { var: key, value })
        };

        Ok(Self {
            bind_address: var("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string()),
            database_url: var("DATABASE_URL"),
            environment: var("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Development),
            access_token_secret,
            access_token_expiry: duration("ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TOKEN_EXPIRY)?,
            refresh_token_secret,
            refresh_token_expiry: duration("REFRESH_TOKEN_EXPIRY", DEFAULT_REFRESH_TOKEN_EXPIRY)?,
            registration_refresh_token_expiry: duration(
                "REGISTRATION_REFRESH_TOKEN_EXPIRY",
                DEFAULT_REGISTRATION_REFRESH_TOKEN_EXPIRY,
            )?,
            allowed_origins: var("ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

/// Parse an expiry such as `15m`, `12h`, `7d`, `2w` or plain seconds
///
/// Values above [`MAX_TOKEN_TTL`] are rejected.
pub fn parse_expiry(value: &str) -> Option<Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount.parse().ok()?;
    if amount <= 0 {
        return None;
    }

    let unit_seconds: i64 = match unit.trim() {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        _ => return None,
    };
    let duration = Duration::seconds(amount.checked_mul(unit_seconds)?);

    (duration <= MAX_TOKEN_TTL).then_some(duration)
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::from_vars(|key| match key {
        "ACCESS_TOKEN_SECRET" => Some("test-access-secret-key-for-testing-only".to_string()),
        "REFRESH_TOKEN_SECRET" => Some("test-refresh-secret-key-for-testing-only".to_string()),
        _ => None,
    })
    .expect("test config should load")
}
