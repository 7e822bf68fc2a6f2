// Axum web server layer

use axum::error_handling::HandleErrorLayer;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub mod handlers;
pub mod responses;

use crate::auth::audit::AuditLogger;
use crate::auth::token::TokenHash;
use crate::auth::trusted_hosts::HostFilter;
use crate::core::errors::AppError;
use crate::core::models::User;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Application state containing all shared dependencies
///
/// All components are wrapped in Arc for shared ownership across async tasks.
/// Components must be Send + Sync for thread safety.
#[derive(Clone)]
pub struct AppState {
    pub user_store: Arc<dyn UserStore + Send + Sync>,
    pub token_store: Arc<dyn TokenStore + Send + Sync>,
    pub audit: Arc<AuditLogger>,
    pub config: Arc<Config>,
}

/// Trait for user lookups
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    /// Connectivity probe for the health endpoint
    async fn ping(&self) -> Result<(), AppError>;
}

/// Trait for bearer token persistence
///
/// Only token hashes cross this boundary; plaintext tokens never reach a
/// store implementation.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        token_hash: &TokenHash,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
    /// Resolve a token hash to a user id, ignoring revoked and expired tokens
    async fn resolve(&self, token_hash: &TokenHash) -> Result<Option<Uuid>, AppError>;
    async fn revoke(&self, token_hash: &TokenHash) -> Result<(), AppError>;
}

// Re-export Config from config module
pub use crate::config::Config;

/// Create the Axum router with all routes and middleware
///
/// Middleware stack (outermost to innermost):
/// - Trusted-host check - rejects requests with an unexpected Host header
/// - Request ID + tracing (tower-http) - request ID generation, structured logging
/// - Request timeout (tower::timeout) - global timeout, 408 on expiry
/// - Body size limit (tower-http::limit)
/// - Auth middleware - bearer token validation (skipped for public routes)
/// - Rate limiting (tower_governor) - `/api/login` only
///
/// Note: `/`, `/health` and `/api/login` bypass auth middleware.
pub fn create_router(
    app_state: AppState,
    auth_state: Option<Arc<crate::auth::middleware::AuthState>>,
) -> Router {
    let body_limit = app_state.config.body_size_limit_bytes;
    let timeout_secs = app_state.config.request_timeout_secs;
    let host_filter = HostFilter::new(&app_state.config.trusted_hosts);

    // Login is public but rate limited per client IP. The extractor reads
    // X-Forwarded-For / X-Real-IP, which the reverse proxy sets.
    let mut login_router = Router::new().route("/api/login", post(handlers::login_handler));
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(app_state.config.rate_limit_per_second)
        .burst_size(app_state.config.rate_limit_burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish();
    if let Some(conf) = governor_conf {
        login_router = login_router.layer(GovernorLayer {
            config: Box::leak(Box::new(conf)),
        });
    }

    let mut router = Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_handler))
        .route("/api/user", get(handlers::current_user_handler))
        .route("/api/logout", post(handlers::logout_handler))
        .merge(login_router);

    // Apply auth middleware to protected routes only
    if let Some(auth_state) = auth_state {
        router = router.route_layer(axum::middleware::from_fn_with_state(
            auth_state,
            |state: State<Arc<crate::auth::middleware::AuthState>>,
             request: Request,
             next: Next| async move {
                // Public routes skip bearer auth
                let path = request.uri().path();
                if path == "/" || path == "/health" || path == "/api/login" {
                    return Ok(next.run(request).await);
                }

                crate::auth::middleware::require_auth(state, request, next).await
            },
        ));
    }

    // Body size limit - applied inside the timeout so oversized bodies are
    // rejected with 413 before the clock matters
    router = router.layer(RequestBodyLimitLayer::new(body_limit));

    // Timeout layer with HandleErrorLayer to convert timeout errors to HTTP
    // responses. HandleErrorLayer must come BEFORE timeout to catch the error.
    let timeout_stack = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(|e: BoxError| async move {
            let status = if e.is::<tower::timeout::error::Elapsed>() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, e.to_string())
        }))
        .timeout(Duration::from_secs(timeout_secs))
        .into_inner();
    router = router.layer(timeout_stack);

    // Request IDs are minted at the edge and propagated to the response, so
    // error bodies and log lines can be correlated
    router = router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .into_inner(),
    );

    // Trusted-host validation sits outermost; an empty pattern list disables it
    if !host_filter.is_empty() {
        router = router.layer(axum::middleware::from_fn_with_state(
            Arc::new(host_filter),
            crate::auth::trusted_hosts::trusted_host_middleware,
        ));
    }

    router.with_state(app_state)
}
