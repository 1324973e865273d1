//! HTTP control surface
//!
//! Thin REST + SSE layer over an `EngineHandle`: every handler either reads
//! the published status or forwards one command. Nothing here holds playback
//! state of its own.

pub mod handlers;
pub mod sse;

use crate::error::{Error, Result};
use crate::playback::engine::EngineHandle;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub engine: EngineHandle,
    pub port: u16,
}

/// Build the router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                .route("/status", get(handlers::get_status))
                .route("/diagnostics", get(handlers::get_diagnostics))
                // Playback control
                .route("/playback/play", post(handlers::play))
                .route("/playback/pause", post(handlers::pause))
                .route("/playback/stop", post(handlers::stop))
                .route("/playback/restart", post(handlers::restart))
                // Volume
                .route("/volume", get(handlers::get_volume).post(handlers::set_volume))
                // Host app integration
                .route("/foreground/pause", post(handlers::foreground_pause))
                .route("/foreground/resume", post(handlers::foreground_resume))
                .route("/focus", post(handlers::focus))
                .route("/lifecycle", post(handlers::lifecycle))
                // SSE event stream
                .route("/events", get(sse::event_stream)),
        )
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}
