use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use rand::{rngs::OsRng, Rng};
use tracing::error;

/// Length of the per-user salt.
pub const SALT_LEN: usize = 30;

/// Length of the emailed activation token.
pub const ACTIVATION_TOKEN_LEN: usize = 8;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("salt is not usable: {0}")]
    InvalidSalt(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Random alphanumeric string drawn from the OS CSPRNG.
pub fn random_token(len: usize) -> String {
    let mut rng = OsRng;
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Argon2id hash of `plain` keyed by the caller-supplied `salt`.
///
/// The salt's bytes are B64-encoded into the PHC salt, so any alphanumeric
/// salt of [`SALT_LEN`] is accepted and the same password and salt always
/// produce the same PHC string.
pub fn derive_hash(plain: &str, salt: &str) -> Result<String, PasswordError> {
    if plain.is_empty() {
        return Err(PasswordError::EmptyPassword);
    }
    let salt = SaltString::encode_b64(salt.as_bytes())
        .map_err(|e| PasswordError::InvalidSalt(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}
