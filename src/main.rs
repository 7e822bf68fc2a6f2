// Main entry point for Vestibule

use vestibule::api::{create_router, AppState, TokenStore, UserStore};
use vestibule::auth::audit::AuditLogger;
use vestibule::auth::middleware::AuthState;
use vestibule::auth::store::{MemoryTokenStore, PgTokenStore, PgUserStore, YamlUserStore};
use vestibule::config::Config;

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load and validate configuration first (before any logging)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Initialize tracing subscriber with config values
    // Must be done only once - tracing panics if init() is called multiple times
    init_tracing(&config)?;

    info!("Starting Vestibule");

    info!(
        bind_address = %config.bind_address,
        port = config.port,
        "Configuration loaded"
    );

    // 3. Initialize database pool (if configured)
    let db_pool: Option<Arc<sqlx::PgPool>> = match config.database_url {
        Some(ref database_url) => {
            let pool = sqlx::PgPool::connect(database_url).await.map_err(|e| {
                error!(error = %e, "Failed to connect to database");
                e
            })?;
            Some(Arc::new(pool))
        }
        None => None,
    };

    if db_pool.is_some() {
        info!("Database pool initialized");
    }

    // 4. Select stores (database or YAML-seeded fallback)
    let user_store: Arc<dyn UserStore + Send + Sync>;
    let token_store: Arc<dyn TokenStore + Send + Sync>;
    if let Some(ref pool) = db_pool {
        user_store = Arc::new(PgUserStore::new((**pool).clone()));
        token_store = Arc::new(PgTokenStore::new((**pool).clone()));
        info!("Database stores initialized");
    } else if let Some(ref path) = config.users_yaml_path {
        let store = YamlUserStore::from_file(path).map_err(|e| {
            error!(error = %e, path = ?path, "Failed to load users file");
            e
        })?;
        info!(users = store.len(), path = ?path, "YAML user store initialized");
        user_store = Arc::new(store);
        token_store = Arc::new(MemoryTokenStore::new());
    } else {
        anyhow::bail!("Either DATABASE_URL or USERS_YAML_PATH must be set");
    }

    // 5. Initialize audit logger
    let audit = Arc::new(AuditLogger::new(db_pool.clone()));

    info!("Audit logger initialized");

    // 6. Create AuthState
    let auth_state = Arc::new(AuthState {
        user_store: user_store.clone(),
        token_store: token_store.clone(),
        audit: audit.clone(),
        login_path: config.login_path.clone(),
    });

    // 7. Create AppState
    let app_state = AppState {
        user_store,
        token_store,
        audit,
        config: Arc::new(config.clone()),
    };

    // 8. Create router
    let router = create_router(app_state, Some(auth_state));

    info!("Router created");

    // 9. Start HTTP server
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        error!(error = %e, addr = %addr, "Failed to bind to address");
        e
    })?;

    info!(addr = %addr, "Server listening on {}", addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = %e, "Server error");
            e
        })?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber based on configuration
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let level = parse_log_level(&config.log_level)?;

    // Create filter from RUST_LOG env var or config
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_env_filter(filter);

    if config.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}

/// Parse log level string to tracing Level
fn parse_log_level(level: &str) -> anyhow::Result<tracing::Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(tracing::Level::TRACE),
        "debug" => Ok(tracing::Level::DEBUG),
        "info" => Ok(tracing::Level::INFO),
        "warn" => Ok(tracing::Level::WARN),
        "error" => Ok(tracing::Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {}", level),
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            info!("SIGTERM received, starting graceful shutdown");
        },
    }
}
