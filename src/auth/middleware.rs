// Axum authentication middleware

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::api::responses::{ApiError, AuthFailure};
use crate::api::{TokenStore, UserStore};
use crate::auth::audit::{AuditLogger, AuthEvent};
use crate::auth::token::AuthToken;
use crate::core::errors::AppError;
use crate::core::models::AuthedUser;

/// Authentication state containing all dependencies
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<dyn UserStore + Send + Sync>,
    pub token_store: Arc<dyn TokenStore + Send + Sync>,
    pub audit: Arc<AuditLogger>,
    /// Redirect target for unauthenticated browser requests
    pub login_path: String,
}

/// Authentication middleware function
///
/// Extracts the bearer token from the `Authorization` header, resolves it to
/// a user, and inserts [`AuthedUser`] into request extensions for handlers.
///
/// Rejections follow the client's content negotiation: requests that accept
/// HTML are redirected to the login page, everything else gets a JSON 401.
pub async fn require_auth(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthFailure> {
    let wants_html = prefers_html(request.headers());
    let ip = client_ip(request.headers());
    let ua = user_agent(request.headers());

    // 1. Extract bearer token from header
    let token_str = match extract_bearer_token(request.headers()) {
        Some(token) => token,
        None => {
            auth_state.audit.log_event(
                AuthEvent::AuthFailure {
                    reason: "Missing bearer token".to_string(),
                },
                None,
                ip.as_deref(),
                ua.as_deref(),
            );
            return Err(reject(&auth_state, wants_html));
        }
    };

    // 2. Hash token
    let token = AuthToken::new(&token_str);
    let token_hash = token.hash();

    // 3. Resolve token to a user id
    let user_id = match auth_state.token_store.resolve(&token_hash).await {
        Ok(Some(user_id)) => user_id,
        Ok(None) => {
            auth_state.audit.log_event(
                AuthEvent::AuthFailure {
                    reason: "Invalid token".to_string(),
                },
                Some(&token_hash),
                ip.as_deref(),
                ua.as_deref(),
            );
            return Err(reject(&auth_state, wants_html));
        }
        Err(e) => {
            error!(error = %e, "Token lookup failed");
            return Err(AuthFailure::Api(ApiError::from_app_error(e)));
        }
    };

    // 4. Load the user
    let user = match auth_state.user_store.find_by_id(user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            auth_state.audit.log_event(
                AuthEvent::AuthFailure {
                    reason: "Token references unknown user".to_string(),
                },
                Some(&token_hash),
                ip.as_deref(),
                ua.as_deref(),
            );
            return Err(reject(&auth_state, wants_html));
        }
        Err(e) => {
            error!(error = %e, "User lookup failed");
            return Err(AuthFailure::Api(ApiError::from_app_error(e)));
        }
    };

    // 5. Log success
    auth_state.audit.log_event(
        AuthEvent::AuthSuccess,
        Some(&token_hash),
        ip.as_deref(),
        ua.as_deref(),
    );

    // 6. Set extension for handlers
    request.extensions_mut().insert(AuthedUser { user, token_hash });

    // 7. Continue to next middleware/handler
    Ok(next.run(request).await)
}

/// Build the rejection for an unauthenticated request
fn reject(auth_state: &AuthState, wants_html: bool) -> AuthFailure {
    if wants_html {
        AuthFailure::Redirect {
            location: auth_state.login_path.clone(),
        }
    } else {
        AuthFailure::Api(ApiError::from_app_error(AppError::Unauthenticated))
    }
}

/// Extract a bearer token from the Authorization header
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// True when the client negotiates for HTML rather than JSON
pub(crate) fn prefers_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("text/html") && !accept.contains("application/json"))
        .unwrap_or(false)
}

/// Extract client IP from request headers
///
/// Checks `X-Forwarded-For` first (set by the reverse proxy), then
/// `X-Real-IP`. The first entry of a forwarded list is the client.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .or_else(|| headers.get("X-Real-IP"))
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
}

/// Extract user agent from request headers
pub(crate) fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer vst_token_123".parse().unwrap());

        let token = extract_bearer_token(&headers);
        assert_eq!(token, Some("vst_token_123".to_string()));
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_prefers_html() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            "text/html,application/xhtml+xml".parse().unwrap(),
        );
        assert!(prefers_html(&headers));
    }

    #[test]
    fn test_prefers_json_over_html() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            "application/json, text/html".parse().unwrap(),
        );
        assert!(!prefers_html(&headers));
    }

    #[test]
    fn test_prefers_html_default_is_json() {
        let headers = HeaderMap::new();
        assert!(!prefers_html(&headers));
    }

    #[test]
    fn test_client_ip_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-For", "203.0.113.9, 10.0.0.1".parse().unwrap());

        assert_eq!(client_ip(&headers), Some("203.0.113.9".to_string()));
    }

    #[test]
    fn test_client_ip_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Real-IP", "203.0.113.9".parse().unwrap());

        assert_eq!(client_ip(&headers), Some("203.0.113.9".to_string()));
    }
}
