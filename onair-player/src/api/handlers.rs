//! HTTP request handlers

use super::AppContext;
use crate::error::Error;
use crate::platform::FocusEvent;
use crate::playback::engine::EngineDiagnostics;
use crate::playback::status::EngineStatus;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
    port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: u8, // 0-100 user-facing scale
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub volume: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    Foreground,
    Background,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    state: AppLifecycle,
}

type ApiError = (StatusCode, Json<StatusResponse>);

fn ok() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

fn engine_error(action: &str, e: Error) -> ApiError {
    error!("{} failed: {}", action, e);
    let code = match e {
        Error::EngineClosed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

fn command(action: &str, result: crate::error::Result<()>) -> Result<Json<StatusResponse>, ApiError> {
    match result {
        Ok(()) => {
            info!("{} command accepted", action);
            Ok(ok())
        }
        Err(e) => Err(engine_error(action, e)),
    }
}

// ============================================================================
// Health and Status
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "onair-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        port: ctx.port,
    })
}

/// GET /api/v1/status
pub async fn get_status(State(ctx): State<AppContext>) -> Json<EngineStatus> {
    Json(ctx.engine.status())
}

/// GET /api/v1/diagnostics
pub async fn get_diagnostics(
    State(ctx): State<AppContext>,
) -> Result<Json<EngineDiagnostics>, ApiError> {
    ctx.engine
        .diagnostics()
        .await
        .map(Json)
        .map_err(|e| engine_error("Diagnostics", e))
}

// ============================================================================
// Playback Control
// ============================================================================

/// POST /api/v1/playback/play
pub async fn play(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    command("Play", ctx.engine.play())
}

/// POST /api/v1/playback/pause
pub async fn pause(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    command("Pause", ctx.engine.pause())
}

/// POST /api/v1/playback/stop
pub async fn stop(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    command("Stop", ctx.engine.stop())
}

/// POST /api/v1/playback/restart
pub async fn restart(State(ctx): State<AppContext>) -> Result<Json<StatusResponse>, ApiError> {
    command("Restart", ctx.engine.force_restart())
}

// ============================================================================
// Volume
// ============================================================================

/// GET /api/v1/volume
pub async fn get_volume(State(ctx): State<AppContext>) -> Json<VolumeResponse> {
    let system_volume = ctx.engine.status().volume;
    Json(VolumeResponse {
        volume: (system_volume * 100.0).round() as u8,
    })
}

/// POST /api/v1/volume
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Json(req): Json<VolumeRequest>,
) -> Result<Json<VolumeResponse>, ApiError> {
    if req.volume > 100 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(StatusResponse {
                status: "volume must be between 0 and 100".to_string(),
            }),
        ));
    }

    // Convert user scale (0-100) to system scale (0.0-1.0)
    ctx.engine
        .set_volume(req.volume as f32 / 100.0)
        .map_err(|e| engine_error("Set volume", e))?;

    Ok(Json(VolumeResponse { volume: req.volume }))
}

// ============================================================================
// Host App Integration
// ============================================================================

/// POST /api/v1/foreground/pause
pub async fn foreground_pause(
    State(ctx): State<AppContext>,
) -> Result<Json<StatusResponse>, ApiError> {
    command("Foreground pause", ctx.engine.pause_for_foreground_content())
}

/// POST /api/v1/foreground/resume
pub async fn foreground_resume(
    State(ctx): State<AppContext>,
) -> Result<Json<StatusResponse>, ApiError> {
    command("Foreground resume", ctx.engine.resume_after_foreground_content())
}

/// POST /api/v1/focus
pub async fn focus(
    State(ctx): State<AppContext>,
    Json(event): Json<FocusEvent>,
) -> Result<Json<StatusResponse>, ApiError> {
    command("Focus", ctx.engine.focus(event))
}

/// POST /api/v1/lifecycle
pub async fn lifecycle(
    State(ctx): State<AppContext>,
    Json(req): Json<LifecycleRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let backgrounded = matches!(req.state, AppLifecycle::Background);
    command("Lifecycle", ctx.engine.set_backgrounded(backgrounded))
}
