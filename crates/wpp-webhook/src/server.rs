//! HTTP API Server
//!
//! Starts and manages the axum-based webhook server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use wpp_agent::ActionGroupHandler;
use wpp_core::{SecretsHelper, TableStore};

use crate::routes::routes;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Table inbound messages are written to
    pub messages: Arc<dyn TableStore>,
    pub secrets: Arc<SecretsHelper>,
    pub actions: Arc<ActionGroupHandler>,
}

/// Build the router with its layers
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn start_server(
    port: u16,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Webhook API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
