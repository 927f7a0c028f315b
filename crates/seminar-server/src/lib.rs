//! Seminar server library logic.

pub mod api;
pub mod config;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use seminar_orchestrator::Orchestrator;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Room and agent lifecycle.
    pub orchestrator: Orchestrator,
    /// Defaults applied to create requests that omit them.
    pub seminar_defaults: config::SeminarConfig,
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/seminars",
            post(api::create_seminar_handler).get(api::list_seminars_handler),
        )
        .route(
            "/api/seminars/{roomName}",
            get(api::get_seminar_handler).delete(api::close_seminar_handler),
        )
        .route(
            "/api/seminars/{roomName}/agent",
            post(api::deploy_agent_handler)
                .get(api::get_agent_handler)
                .delete(api::stop_agent_handler),
        )
        .route(
            "/api/seminars/{roomName}/token",
            post(api::issue_token_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
