//! JWT access and refresh token issuing
//!
//! Access and refresh tokens are signed with different HS256 secrets, so one
//! kind can never be accepted (or forged) as the other. Both embed their
//! expiry; validation uses zero leeway.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use volunteerhub_shared::{Role, Subject};

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Internal subject id
    pub sub: Uuid,
    /// External (client-facing) id
    pub id: String,
    pub email: String,
    pub role: Role,
    pub typ: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub typ: TokenType,
    /// Makes every issued refresh token distinct
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Token signature is invalid")]
    InvalidSignature,
    #[error("Token is malformed")]
    Malformed,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }
}

#[derive(Clone)]
struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenKeys {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Issues and validates access and refresh tokens
#[derive(Clone)]
pub struct JwtManager {
    access: TokenKeys,
    refresh: TokenKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl JwtManager {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: TokenKeys::from_secret(access_secret),
            refresh: TokenKeys::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
            validation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.access_token_secret,
            &config.refresh_token_secret,
            config.access_token_expiry,
            config.refresh_token_expiry,
        )
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Default refresh token lifetime (login and refresh)
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Generate an access token for `subject`
    pub fn generate_access_token(&self, subject: &Subject) -> Result<String, TokenError> {
        self.generate_access_token_at(subject, OffsetDateTime::now_utc())
    }

    /// Generate an access token as if issued at `issued_at`
    pub fn generate_access_token_at(
        &self,
        subject: &Subject,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.id,
            id: subject.external_id.clone(),
            email: subject.email.clone(),
            role: subject.role,
            typ: TokenType::Access,
            iat: issued_at.unix_timestamp(),
            exp: expires_at(issued_at, self.access_ttl)?,
        };
        sign(&self.access, &claims)
    }

    /// Generate a refresh token for `subject_id` valid for `ttl`
    pub fn generate_refresh_token(&self, subject_id: Uuid, ttl: Duration) -> Result<String, TokenError> {
        self.generate_refresh_token_at(subject_id, ttl, OffsetDateTime::now_utc())
    }

    /// Generate a refresh token as if issued at `issued_at`
    pub fn generate_refresh_token_at(
        &self,
        subject_id: Uuid,
        ttl: Duration,
        issued_at: OffsetDateTime,
    ) -> Result<String, TokenError> {
        let claims = RefreshClaims {
            sub: subject_id,
            typ: TokenType::Refresh,
            jti: Uuid::new_v4(),
            iat: issued_at.unix_timestamp(),
            exp: expires_at(issued_at, ttl)?,
        };
        sign(&self.refresh, &claims)
    }

    /// Validate an access token and return its claims
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        let claims: Claims = verify(&self.access, &self.validation, token)?;
        if claims.typ != TokenType::Access {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }

    /// Validate a refresh token and return its claims
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let claims: RefreshClaims = verify(&self.refresh, &self.validation, token)?;
        if claims.typ != TokenType::Refresh {
            return Err(TokenError::Malformed);
        }
        Ok(claims)
    }
}

fn expires_at(issued_at: OffsetDateTime, ttl: Duration) -> Result<i64, TokenError> {
    issued_at
        .checked_add(ttl)
        .map(OffsetDateTime::unix_timestamp)
        .ok_or_else(|| TokenError::Encoding(format!("token lifetime {} is out of range", ttl)))
}

fn sign<T: Serialize>(keys: &TokenKeys, claims: &T) -> Result<String, TokenError> {
    encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
        .map_err(|e| TokenError::Encoding(e.to_string()))
}

fn verify<T: DeserializeOwned>(
    keys: &TokenKeys,
    validation: &Validation,
    token: &str,
) -> Result<T, TokenError> {
    Ok(decode::<T>(token, &keys.decoding, validation)?.claims)
}
