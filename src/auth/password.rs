// Password hashing and verification

use crate::core::errors::AppError;
use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Plaintext password wrapper with memory protection
///
/// Uses `secrecy::Secret` to prevent accidental logging or memory swapping
/// of password material.
pub struct Password(Secret<String>);

impl Password {
    /// Create a new Password from a string
    pub fn new(password: impl Into<String>) -> Self {
        Self(Secret::new(password.into()))
    }

    /// Expose the plaintext password (use with caution)
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    /// True when the wrapped string is empty
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password")
            .field("value", &"<REDACTED>")
            .finish()
    }
}

impl fmt::Display for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<REDACTED>")
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Password::new(raw))
    }
}

/// Hash a password with Argon2id and a fresh random salt
///
/// Returns a PHC-format string suitable for storage in `users.password_hash`.
pub fn hash_password(password: &Password) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|e| AppError::HashingError(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC-format hash
///
/// A mismatch is `Ok(false)`; a malformed stored hash is an error, since it
/// means the row is corrupt rather than the caller being wrong.
pub fn verify_password(password: &Password, stored_hash: &str) -> Result<bool, AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::HashingError(format!("Malformed stored hash: {}", e)))?;

    match Argon2::default().verify_password(password.expose_secret().as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::HashingError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let password = Password::new("correct horse battery staple");
        let hash = hash_password(&password).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(&password, &hash).unwrap());
    }

    #[test]
    fn test_wrong_password_does_not_verify() {
        let password = Password::new("correct horse battery staple");
        let hash = hash_password(&password).unwrap();

        let wrong = Password::new("tr0ub4dor&3");
        assert!(!verify_password(&wrong, &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let password = Password::new("same password");
        let hash1 = hash_password(&password).unwrap();
        let hash2 = hash_password(&password).unwrap();

        assert_ne!(hash1, hash2, "Fresh salts should produce different hashes");
    }

    #[test]
    fn test_malformed_stored_hash_is_error() {
        let password = Password::new("anything");
        let result = verify_password(&password, "not-a-phc-string");
        assert!(result.is_err());
    }

    #[test]
    fn test_password_redaction() {
        let password = Password::new("secret_password_123");
        let debug_str = format!("{:?}", password);
        let display_str = format!("{}", password);

        assert!(!debug_str.contains("secret_password_123"), "Debug should not expose password");
        assert!(!display_str.contains("secret_password_123"), "Display should not expose password");
        assert!(debug_str.contains("REDACTED"));
    }
}
