// Core domain types

use crate::auth::password::Password;
use crate::auth::token::TokenHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The user entity.
///
/// Deliberately does NOT derive `Serialize`: the password hash must never
/// cross the serialization boundary. Outward-facing responses go through
/// [`UserProfile`].
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Outward-facing view of this user
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<REDACTED>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Serializable view of a user, with hidden attributes stripped
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Authenticated identity, inserted into request extensions by the auth
/// middleware. Carries the token hash so handlers can revoke the presenting
/// token without re-reading the Authorization header.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user: User,
    pub token_hash: TokenHash,
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: Password,
}
