// Host header validation

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::api::responses::ApiError;
use crate::core::errors::AppError;

/// Set of Host patterns the reverse proxy is expected to forward
///
/// Patterns are either exact names (`app.example.com`) or leading wildcards
/// (`*.example.com`). A wildcard matches subdomains but not the bare apex.
/// An empty set disables the check entirely (development default).
pub struct HostFilter {
    patterns: Vec<String>,
}

impl HostFilter {
    /// Build a filter from configured patterns
    pub fn new(patterns: &[String]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// True when no patterns are configured
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check a Host header value against the pattern set
    ///
    /// Port suffixes are stripped before matching; comparison is
    /// case-insensitive.
    pub fn matches(&self, host: &str) -> bool {
        let host = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }

        self.patterns.iter().any(|pattern| {
            if let Some(suffix) = pattern.strip_prefix("*.") {
                // `*.example.com` matches `a.example.com` but not `example.com`
                host.ends_with(&format!(".{}", suffix))
            } else {
                host == *pattern
            }
        })
    }
}

/// Middleware rejecting requests whose Host header is not trusted
pub async fn trusted_host_middleware(
    State(filter): State<Arc<HostFilter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok());

    match host {
        Some(host) if filter.matches(host) => Ok(next.run(request).await),
        other => {
            warn!(host = ?other, "Rejected request with untrusted Host header");
            Err(ApiError::from_app_error(AppError::UntrustedHost))
        }
    }
}
