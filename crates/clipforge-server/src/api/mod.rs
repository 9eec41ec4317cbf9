pub mod agents;
pub mod workflows;

use axum::Router;

use clipforge_core::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api", workflows::router())
        .nest("/api/agents", agents::router())
}
