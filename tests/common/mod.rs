// Shared fixtures for integration tests
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use vestibule::api::{create_router, AppState, TokenStore, UserStore};
use vestibule::auth::audit::AuditLogger;
use vestibule::auth::middleware::AuthState;
use vestibule::auth::store::{MemoryTokenStore, YamlUserStore};
use vestibule::config::Config;

pub const SEED_NAME: &str = "Jordan Walker";
pub const SEED_EMAIL: &str = "jordan@example.com";
pub const SEED_PASSWORD: &str = "correct horse battery staple";

/// IP the login rate limiter keys on; tests present it via X-Forwarded-For
/// the same way the reverse proxy would
pub const CLIENT_IP: &str = "203.0.113.9";

fn seed_users_file() -> NamedTempFile {
    let yaml_content = format!(
        r#"
users:
  - name: "{}"
    email: "{}"
    password: "{}"
"#,
        SEED_NAME, SEED_EMAIL, SEED_PASSWORD
    );

    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "{}", yaml_content).unwrap();
    temp_file
}

/// Build a full router over the YAML/in-memory stores
pub fn build_app(config: Config) -> Router {
    let file = seed_users_file();
    let store = YamlUserStore::from_file(file.path()).unwrap();

    let user_store: Arc<dyn UserStore + Send + Sync> = Arc::new(store);
    let token_store: Arc<dyn TokenStore + Send + Sync> = Arc::new(MemoryTokenStore::new());
    let audit = Arc::new(AuditLogger::new(None));

    let auth_state = Arc::new(AuthState {
        user_store: user_store.clone(),
        token_store: token_store.clone(),
        audit: audit.clone(),
        login_path: config.login_path.clone(),
    });

    let app_state = AppState {
        user_store,
        token_store,
        audit,
        config: Arc::new(config),
    };

    create_router(app_state, Some(auth_state))
}

/// Build a router with the default test configuration
pub fn build_default_app() -> Router {
    build_app(Config::test_config())
}

/// Drive one request through the router and collect the JSON body
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

/// POST /api/login with the given credentials
pub async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
    let body = serde_json::json!({ "email": email, "password": password }).to_string();
    let request = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Forwarded-For", CLIENT_IP)
        .body(Body::from(body))
        .unwrap();

    send(app, request).await
}

/// Login with the seeded user and return the bearer token
pub async fn login_seed_user(app: &Router) -> String {
    let (status, body) = login(app, SEED_EMAIL, SEED_PASSWORD).await;
    assert_eq!(status, StatusCode::OK, "seed login should succeed: {body}");
    body["token"]
        .as_str()
        .expect("login response should carry a token")
        .to_string()
}
