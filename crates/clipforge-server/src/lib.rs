//! ClipForge Server — HTTP surface for the video workflow orchestrator.
//!
//! Provides:
//! - RESTful HTTP API via axum (create, poll and cancel workflows)
//! - Agent introspection with persisted run statistics
//! - SQLite persistence through `clipforge-core`
//!
//! Workflows run on spawned tasks; `POST /api/create` returns as soon as
//! the request has been validated and planned.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use clipforge_core::{AppConfig, AppState, AppStateInner, Database};

/// Configuration for the ClipForge HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    /// Optional path to the YAML config file.
    pub config_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            db_path: "clipforge.db".to_string(),
            config_path: None,
        }
    }
}

/// Create a shared `AppState` from a database path and optional config file.
///
/// Useful when the state is shared between the HTTP server and another
/// consumer such as the CLI.
pub async fn create_app_state(db_path: &str, config_path: Option<&str>) -> Result<AppState, String> {
    let config = AppConfig::load(config_path)?;
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(AppStateInner::new(db, config)))
}

/// Build the full router (API routes, health check, CORS, request tracing).
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // A host binary may already have installed a subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "clipforge_core=info,clipforge_server=info,tower_http=info".into()
            }),
        )
        .try_init();

    tracing::info!(
        "Starting ClipForge server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.db_path, config.config_path.as_deref()).await?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("ClipForge server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "clipforge-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
