// src/api/mod.rs — HTTP API for running rewrites and collecting feedback

pub mod auth;
pub mod handlers;
pub mod types;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::core::orchestrator::WorkflowEngine;
use crate::memory::StoreHandle;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    /// `None` runs the API without persistence.
    pub store: Option<StoreHandle>,
    pub token: Option<String>,
}

/// Build the axum router with all API routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/rewrite", post(handlers::rewrite))
        .route("/api/v1/requests/{id}", get(handlers::get_request))
        .route("/api/v1/feedback", post(handlers::submit_feedback))
        .layer(cors)
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn start_server(host: &str, port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let router = build_router(state);

    tracing::info!("API server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down API server");
        })
        .await?;
    Ok(())
}
