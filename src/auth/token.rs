// Bearer token generation and hashing

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hex;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use std::fmt;

/// Number of random bytes behind each token
const TOKEN_BYTES: usize = 32;

/// Prefix on every issued token, so leaked tokens are recognizable in scans
const TOKEN_PREFIX: &str = "vst_";

/// Token hash - SHA-256 of the bearer token (64-character hex string)
///
/// This is the only form of a token that is ever stored or logged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenHash(String);

impl TokenHash {
    /// Create a TokenHash from a plaintext bearer token
    ///
    /// The hash is deterministic: same token always produces same hash, so
    /// lookups are a single indexed equality query.
    pub fn from_token(token: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let hash_bytes = hasher.finalize();
        Self(hex::encode(hash_bytes))
    }

    /// Create a TokenHash from an existing hash string (64 hex characters)
    ///
    /// Use this when you already have a hash and don't want to hash again.
    pub fn from_hash_string(hash_str: &str) -> Result<Self, String> {
        if hash_str.len() != 64 {
            return Err(format!("Invalid hash length: expected 64, got {}", hash_str.len()));
        }
        if !hash_str.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("Invalid hash format: must be 64 hex characters".to_string());
        }
        Ok(Self(hash_str.to_string()))
    }

    /// Get the hash as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bearer token wrapper with memory protection
///
/// Uses `secrecy::Secret` to prevent accidental logging of token material.
/// The plaintext is exposed exactly once, in the login response.
pub struct AuthToken(Secret<String>);

impl AuthToken {
    /// Generate a fresh token from 32 bytes of OS randomness
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let encoded = URL_SAFE_NO_PAD.encode(bytes);
        Self(Secret::new(format!("{}{}", TOKEN_PREFIX, encoded)))
    }

    /// Wrap an existing token string
    pub fn new(token: &str) -> Self {
        Self(Secret::new(token.to_string()))
    }

    /// Hash the token to produce a TokenHash
    pub fn hash(&self) -> TokenHash {
        TokenHash::from_token(self.expose_secret())
    }

    /// Expose the plaintext token (use with caution)
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<REDACTED>")
    }
}
