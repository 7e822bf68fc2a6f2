// Database-backed user and token storage with YAML/in-memory fallback

use crate::api::{TokenStore, UserStore};
use crate::auth::password::{hash_password, Password};
use crate::auth::token::TokenHash;
use crate::core::errors::AppError;
use crate::core::models::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Database row structure for user lookup
#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database-backed user store with in-memory caching
pub struct PgUserStore {
    db_pool: PgPool,
    cache: Cache<String, Arc<User>>,
}

impl PgUserStore {
    /// Create a new database-backed user store
    pub fn new(db_pool: PgPool) -> Self {
        let cache = Cache::builder()
            .time_to_live(std::time::Duration::from_secs(300)) // 5 minutes
            .max_capacity(1000)
            .build();

        Self { db_pool, cache }
    }

    async fn cache_user(&self, user: &User) {
        let user = Arc::new(user.clone());
        self.cache
            .insert(format!("email:{}", user.email.to_ascii_lowercase()), user.clone())
            .await;
        self.cache.insert(format!("id:{}", user.id), user).await;
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let cache_key = format!("email:{}", email.to_ascii_lowercase());
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(Some((*cached).clone()));
        }

        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, created_at, updated_at
             FROM users
             WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.db_pool)
        .await?;

        let user = row.map(User::from);
        if let Some(ref user) = user {
            self.cache_user(user).await;
        }

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let cache_key = format!("id:{}", id);
        if let Some(cached) = self.cache.get(&cache_key).await {
            return Ok(Some((*cached).clone()));
        }

        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, password_hash, created_at, updated_at
             FROM users
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        let user = row.map(User::from);
        if let Some(ref user) = user {
            self.cache_user(user).await;
        }

        Ok(user)
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.db_pool).await?;
        Ok(())
    }
}

/// Database-backed token store
///
/// Resolutions are cached briefly so a busy client doesn't hit the database
/// on every request; revocation invalidates the cache entry immediately.
pub struct PgTokenStore {
    db_pool: PgPool,
    cache: Cache<String, Uuid>,
}

impl PgTokenStore {
    /// Create a new database-backed token store
    pub fn new(db_pool: PgPool) -> Self {
        let cache = Cache::builder()
            .time_to_live(std::time::Duration::from_secs(30))
            .max_capacity(10_000)
            .build();

        Self { db_pool, cache }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &TokenHash,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO api_tokens (id, user_id, token_hash, expires_at, created_at)
             VALUES ($1, $2, $3, $4, NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash.as_str())
        .bind(expires_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn resolve(&self, token_hash: &TokenHash) -> Result<Option<Uuid>, AppError> {
        if let Some(user_id) = self.cache.get(token_hash.as_str()).await {
            return Ok(Some(user_id));
        }

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM api_tokens
             WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()",
        )
        .bind(token_hash.as_str())
        .fetch_optional(&self.db_pool)
        .await?;

        if let Some(user_id) = user_id {
            self.cache
                .insert(token_hash.as_str().to_string(), user_id)
                .await;

            // Touch last_used_at, fire-and-forget
            let pool = self.db_pool.clone();
            let hash = token_hash.as_str().to_string();
            tokio::spawn(async move {
                if let Err(e) =
                    sqlx::query("UPDATE api_tokens SET last_used_at = NOW() WHERE token_hash = $1")
                        .bind(&hash)
                        .execute(&pool)
                        .await
                {
                    warn!(error = %e, "Failed to touch token last_used_at");
                }
            });
        }

        Ok(user_id)
    }

    async fn revoke(&self, token_hash: &TokenHash) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE api_tokens SET revoked_at = NOW()
             WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash.as_str())
        .execute(&self.db_pool)
        .await?;

        self.cache.invalidate(token_hash.as_str()).await;
        Ok(())
    }
}

/// Container for the users YAML root structure
#[derive(Debug, Deserialize)]
struct UsersYaml {
    users: Vec<UserEntry>,
}

/// Seed user entry with a plaintext password (development fallback only)
#[derive(Debug, Deserialize)]
struct UserEntry {
    name: String,
    email: String,
    password: String,
}

/// YAML-seeded in-memory user store (for deployment without a database)
///
/// Plaintext seed passwords are hashed with Argon2id at load time, so the
/// in-memory representation carries the same invariants as the database rows.
pub struct YamlUserStore {
    by_email: HashMap<String, User>,
    by_id: HashMap<Uuid, User>,
}

impl YamlUserStore {
    /// Load users from a YAML seed file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(AppError::ConfigurationError(format!(
                "Users file not found at {:?}",
                path_ref
            )));
        }

        let yaml_content = std::fs::read_to_string(path_ref).map_err(|e| {
            AppError::ConfigurationError(format!("Failed to read users file: {}", e))
        })?;

        let users_yaml: UsersYaml = serde_yaml::from_str(&yaml_content).map_err(|e| {
            AppError::ConfigurationError(format!("Failed to parse users YAML: {}", e))
        })?;

        let mut by_email = HashMap::new();
        let mut by_id = HashMap::new();
        for entry in users_yaml.users {
            let now = Utc::now();
            let user = User {
                id: Uuid::new_v4(),
                name: entry.name,
                email: entry.email.clone(),
                password_hash: hash_password(&Password::new(entry.password))?,
                created_at: now,
                updated_at: now,
            };
            by_email.insert(entry.email.to_ascii_lowercase(), user.clone());
            by_id.insert(user.id, user);
        }

        Ok(Self { by_email, by_id })
    }

    /// Number of seeded users
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True when the seed file contained no users
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[async_trait]
impl UserStore for YamlUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.by_email.get(&email.to_ascii_lowercase()).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.by_id.get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

struct TokenRecord {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

/// In-memory token store, paired with [`YamlUserStore`] in database-less mode
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &TokenHash,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tokens = self.tokens.write().await;
        tokens.insert(
            token_hash.as_str().to_string(),
            TokenRecord {
                user_id,
                expires_at,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn resolve(&self, token_hash: &TokenHash) -> Result<Option<Uuid>, AppError> {
        let tokens = self.tokens.read().await;
        Ok(tokens
            .get(token_hash.as_str())
            .filter(|record| !record.revoked && record.expires_at > Utc::now())
            .map(|record| record.user_id))
    }

    async fn revoke(&self, token_hash: &TokenHash) -> Result<(), AppError> {
        let mut tokens = self.tokens.write().await;
        if let Some(record) = tokens.get_mut(token_hash.as_str()) {
            record.revoked = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn seed_file() -> NamedTempFile {
        let yaml_content = r#"
users:
  - name: "Jordan Walker"
    email: "jordan@example.com"
    password: "correct horse battery staple"
  - name: "Sam Reyes"
    email: "sam@example.com"
    password: "another password"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml_content).unwrap();
        temp_file
    }

    #[tokio::test]
    async fn test_yaml_user_store_lookup() {
        let file = seed_file();
        let store = YamlUserStore::from_file(file.path()).unwrap();
        assert_eq!(store.len(), 2);

        let user = store
            .find_by_email("jordan@example.com")
            .await
            .unwrap()
            .expect("seeded user should exist");
        assert_eq!(user.name, "Jordan Walker");

        // Seed passwords are hashed at load
        assert!(user.password_hash.starts_with("$argon2id$"));
        let password = Password::new("correct horse battery staple");
        assert!(verify_password(&password, &user.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_yaml_user_store_email_is_case_insensitive() {
        let file = seed_file();
        let store = YamlUserStore::from_file(file.path()).unwrap();

        let user = store.find_by_email("Jordan@Example.COM").await.unwrap();
        assert!(user.is_some());
    }

    #[tokio::test]
    async fn test_yaml_user_store_unknown_email() {
        let file = seed_file();
        let store = YamlUserStore::from_file(file.path()).unwrap();

        let user = store.find_by_email("nobody@example.com").await.unwrap();
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_yaml_user_store_find_by_id() {
        let file = seed_file();
        let store = YamlUserStore::from_file(file.path()).unwrap();

        let user = store
            .find_by_email("sam@example.com")
            .await
            .unwrap()
            .expect("seeded user should exist");
        let by_id = store.find_by_id(user.id).await.unwrap();
        assert_eq!(by_id.map(|u| u.email), Some("sam@example.com".to_string()));
    }

    #[test]
    fn test_yaml_user_store_missing_file() {
        let result = YamlUserStore::from_file("/nonexistent/users.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_user_store_malformed_yaml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "users: [not a mapping").unwrap();

        let result = YamlUserStore::from_file(temp_file.path());
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_memory_token_store_lifecycle() {
        let store = MemoryTokenStore::new();
        let user_id = Uuid::new_v4();
        let hash = TokenHash::from_token("vst_test_token");
        let expires_at = Utc::now() + chrono::Duration::hours(1);

        store.insert(user_id, &hash, expires_at).await.unwrap();
        assert_eq!(store.resolve(&hash).await.unwrap(), Some(user_id));

        store.revoke(&hash).await.unwrap();
        assert_eq!(store.resolve(&hash).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_token_store_expiry() {
        let store = MemoryTokenStore::new();
        let user_id = Uuid::new_v4();
        let hash = TokenHash::from_token("vst_expired_token");
        let expires_at = Utc::now() - chrono::Duration::seconds(1);

        store.insert(user_id, &hash, expires_at).await.unwrap();
        assert_eq!(store.resolve(&hash).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_token_store_unknown_token() {
        let store = MemoryTokenStore::new();
        let hash = TokenHash::from_token("vst_never_issued");
        assert_eq!(store.resolve(&hash).await.unwrap(), None);
    }
}
