//! Argon2id password hashing

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::ApiError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

fn argon2() -> Result<Argon2<'static>, ApiError> {
    let params = Params::new(
        19456, // m_cost (19 MiB)
        2,     // t_cost
        1,     // p_cost
        None,
    )
    .map_err(|err| ApiError::internal(format!("invalid argon2 params: {err}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password into a PHC string with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| ApiError::internal(format!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

/// Checks a password against a stored PHC string. A mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| ApiError::internal(format!("stored password hash is malformed: {err}")))?;

    match argon2()?.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(ApiError::internal(format!(
            "password verification failed: {err}"
        ))),
    }
}
