// Security event logging

use crate::auth::token::TokenHash;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

/// Authentication event type
#[derive(Debug, Clone)]
pub enum AuthEvent {
    LoginSuccess,
    LoginFailure { reason: String },
    AuthSuccess,
    AuthFailure { reason: String },
    Logout,
}

impl AuthEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AuthEvent::LoginSuccess => "LOGIN_SUCCESS",
            AuthEvent::LoginFailure { .. } => "LOGIN_FAILURE",
            AuthEvent::AuthSuccess => "AUTH_SUCCESS",
            AuthEvent::AuthFailure { .. } => "AUTH_FAILURE",
            AuthEvent::Logout => "LOGOUT",
        }
    }
}

/// Audit logger for security events
pub struct AuditLogger {
    db_pool: Option<Arc<PgPool>>,
}

impl AuditLogger {
    /// Create a new audit logger
    ///
    /// If `db_pool` is `None`, only structured logging will be used (no
    /// database persistence).
    pub fn new(db_pool: Option<Arc<PgPool>>) -> Self {
        Self { db_pool }
    }

    /// Log an authentication event
    ///
    /// This is fire-and-forget: it spawns an async task and doesn't block the
    /// request. Errors are logged but don't affect the request flow.
    pub fn log_event(
        &self,
        event: AuthEvent,
        token_hash: Option<&TokenHash>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) {
        let db_pool = self.db_pool.clone();
        let hash_str = token_hash.map(|h| h.as_str().to_string());
        let ip = ip_address.map(|s| s.to_string());
        let ua = user_agent.map(|s| s.to_string());

        tokio::spawn(async move {
            // Structured logging
            match event {
                AuthEvent::LoginSuccess => {
                    info!(
                        token_hash = ?hash_str,
                        ip_address = ?ip,
                        user_agent = ?ua,
                        "Login successful"
                    );
                }
                AuthEvent::LoginFailure { ref reason } => {
                    warn!(
                        ip_address = ?ip,
                        user_agent = ?ua,
                        reason = %reason,
                        "Login failed"
                    );
                }
                AuthEvent::AuthSuccess => {
                    info!(
                        token_hash = ?hash_str,
                        ip_address = ?ip,
                        user_agent = ?ua,
                        "Authentication successful"
                    );
                }
                AuthEvent::AuthFailure { ref reason } => {
                    warn!(
                        token_hash = ?hash_str,
                        ip_address = ?ip,
                        user_agent = ?ua,
                        reason = %reason,
                        "Authentication failed"
                    );
                }
                AuthEvent::Logout => {
                    info!(
                        token_hash = ?hash_str,
                        ip_address = ?ip,
                        "Logout"
                    );
                }
            }

            // Database logging (if pool available)
            if let Some(pool) = db_pool {
                // PostgreSQL INET type: pass None for NULL, the string otherwise
                let ip_opt: Option<&str> = ip.as_deref();

                if let Err(e) = sqlx::query(
                    "INSERT INTO auth_audit_log (token_hash, event_type, ip_address, user_agent, created_at)
                     VALUES ($1, $2, $3::inet, $4, NOW())",
                )
                .bind(&hash_str)
                .bind(event.event_type())
                .bind(ip_opt)
                .bind(&ua)
                .execute(pool.as_ref())
                .await
                {
                    warn!(
                        error = %e,
                        "Failed to write audit log to database"
                    );
                }
            }
        });
    }
}
