//! HTTP Gateway
//!
//! Transfer submission and read endpoints over axum, plus OpenAPI docs:
//! - Swagger UI: `/docs`
//! - OpenAPI JSON: `/api-docs/openapi.json`

pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::GatewayConfig;
pub use state::AppState;

/// Build the full router with docs merged in
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/transfers", post(handlers::create_transfer))
        .route("/transfers/user/history", get(handlers::user_history))
        .route(
            "/transfers/conversation/{conversation_id}",
            get(handlers::conversation_transfers),
        )
        .route("/transfers/{tx_hash}", get(handlers::get_transfer))
        .with_state(state)
        // Stateless, so merged after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Serve until `shutdown` flips to true
pub async fn run_server(
    config: &GatewayConfig,
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    info!(addr = %addr, "Gateway listening");
    info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("Gateway shutting down");
        })
        .await
        .context("Server error")?;
    Ok(())
}
