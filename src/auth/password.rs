use crate::error::app_error::AppError;
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::LazyLock;

/// A real Argon2 hash generated once, used as a timing decoy so that login
/// attempts for unknown accounts cost the same as attempts for real ones.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-never-matches", &salt)
        .map(|hash| hash.to_string())
        .unwrap_or_default()
});

pub trait CredentialHasher: Send + Sync {
    fn hash_password(&self, password: &str) -> Result<String, AppError>;
    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
    fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, AppError>;
    /// Burns one verification's worth of work against a decoy hash.
    fn dummy_verify(&self, password: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::password_hash("Failed to hash password", e))?;
        Ok(hash.to_string())
    }

    fn verify_password(&self, password: &str, stored_hash: &str) -> Result<bool, AppError> {
        let parsed = PasswordHash::new(stored_hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    }

    fn dummy_verify(&self, password: &str) {
        if let Ok(hash) = PasswordHash::new(&DUMMY_HASH) {
            let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
        }
    }
}
