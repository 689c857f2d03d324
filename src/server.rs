//! HTTP server setup and request dispatch.
//!
//! Every inbound request, regardless of method, lands in one fallback
//! handler: an exact-path overlay lookup first, then the pass-through proxy.
//! The listener is bound only after every seed has been assembled, so a
//! seeding failure never leaves a half-configured server accepting
//! connections.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::overlay::{self, OverlayMap};
use crate::upstream::UpstreamClient;

/// Shared state for all request handlers.
pub struct AppState {
    /// Exact-path responder registry built during startup
    pub overlays: OverlayMap,
    /// Shared client for upstream fetches and pass-through proxying
    pub upstream: Arc<UpstreamClient>,
    /// Resolved server configuration
    pub config: Config,
}

/// Build the application router around the shared state.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    if let Some(route) = state.overlays.get(&path) {
        return match overlay::respond(route, request.headers()).await {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
    }

    info!(method = %request.method(), path = %path, "proxying to upstream");
    match state.upstream.proxy(request).await {
        Ok(response) => response,
        Err(err) => {
            error!(path = %path, error = %err, "upstream proxy request failed");
            err.into_response()
        }
    }
}

/// Bind the listener and serve until the process exits.
pub async fn run_server(state: Arc<AppState>) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .bind_addr()
        .parse()
        .with_context(|| format!("invalid socket address {}", state.config.bind_addr()))?;
    let port = state.config.port;

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, overlays = state.overlays.len(), "listening");
    info!("To use this registry:");
    info!(" - run `npm config set registry http://127.0.0.1:{port}`");
    info!(" - or add `--registry=http://127.0.0.1:{port}` to npm commands");

    let app = app_router(state);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
