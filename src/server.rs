//! HTTP read API over the snapshot cache.

use crate::core::cache::SnapshotCache;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// GET /currencies.json - Records of the current snapshot
async fn get_currencies(State(cache): State<Arc<SnapshotCache>>) -> Response {
    match cache.get().await {
        Some(snapshot) => {
            debug!(update_id = snapshot.update.id, "Serving currencies");
            Json(snapshot.currencies.clone()).into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "currency data is not loaded yet".to_string(),
            }),
        )
            .into_response(),
    }
}

pub fn router(cache: Arc<SnapshotCache>) -> Router {
    Router::new()
        .route("/currencies.json", get(get_currencies))
        .with_state(cache)
}

#[derive(Clone)]
pub struct HttpServer {
    addr: SocketAddr,
    cache: Arc<SnapshotCache>,
}

impl HttpServer {
    pub fn new(addr: SocketAddr, cache: Arc<SnapshotCache>) -> Self {
        Self { addr, cache }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Binds the listen address and serves until the task is cancelled.
    pub async fn run(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        info!("HTTP server has started at address {}", self.addr);

        axum::serve(listener, router(self.cache))
            .await
            .context("HTTP server stopped")
    }
}
