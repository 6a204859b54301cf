//! Password hashing and verification
//!
//! Argon2id with a per-hash random salt, stored in PHC string format. The
//! async variants move the work onto tokio's blocking pool so a slow hash
//! never stalls unrelated requests on the runtime workers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),
    #[error("Password task failed: {0}")]
    Task(String),
}

/// Hash a plaintext password
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
        .to_string();

    Ok(password_hash)
}

/// Verify a password against a stored digest
///
/// Returns `false` on mismatch and on a malformed digest (fails closed).
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password digest is malformed");
            return false;
        }
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Generate a digest no password will ever match
///
/// Used to spend one verification on logins for unknown emails.
pub fn generate_impossible_hash() -> Result<String, PasswordError> {
    let unguessable = format!("{}{}", Uuid::new_v4(), Uuid::new_v4());
    hash_password(&unguessable)
}

/// [`hash_password`] on the blocking pool
pub async fn spawn_hash_password(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| PasswordError::Task(e.to_string()))?
}

/// [`verify_password`] on the blocking pool. A failed task verifies as `false`.
pub async fn spawn_verify_password(password: String, hash: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await {
        Ok(valid) => valid,
        Err(e) => {
            tracing::error!(error = %e, "Password verification task failed");
            false
        }
    }
}
