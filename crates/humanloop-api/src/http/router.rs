//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Executions
        .route(
            "/executions",
            post(handlers::execution::create_execution).get(handlers::execution::list_executions),
        )
        .route("/executions/{id}", get(handlers::execution::get_execution))
        // Engine pause signal
        .route("/executions/{id}/pause", post(handlers::input::register_pause))
        // Human input
        .route(
            "/executions/{id}/input",
            get(handlers::input::get_input).post(handlers::input::submit_input),
        )
        .route(
            "/executions/{id}/input/cancel",
            post(handlers::input::cancel_input),
        )
        // Signed form links (no API key)
        .route(
            "/forms/{token}",
            get(handlers::form::get_form).post(handlers::form::submit_form),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
