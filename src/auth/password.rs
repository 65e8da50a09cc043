use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::errors::ServiceError;

/// Produces the PHC string stored in `AUTH_PASSWORD_HASH`.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Configuration(format!("cannot hash password: {e}")))
}

/// Checks the shared dashboard password against the configured hash.
///
/// `Ok(false)` is a wrong password; `Err` means the hash itself is missing
/// or malformed.
pub fn verify_password(password: &str, configured_hash: Option<&str>) -> Result<bool, ServiceError> {
    let hashed = configured_hash
        .ok_or_else(|| ServiceError::Configuration("AUTH_PASSWORD_HASH not configured".into()))?;
    let parsed = PasswordHash::new(hashed)
        .map_err(|e| ServiceError::Configuration(format!("AUTH_PASSWORD_HASH is not a valid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
