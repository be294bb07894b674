//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, price status reporting, and Prometheus
//! metrics.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness check (simple OK)
//! - `GET /readyz` - Readiness check (ready once a price is displayed)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /price` - Current display snapshot with departing prices
//! - `GET /voice` - Whether narration is on
//! - `PUT /voice` - Turn narration on or off (`{"enabled": bool}`)
//! - `POST /voice/toggle` - Flip narration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::NarrationEngine;
use crate::domain::narration::{NarrationState, VoiceToggle};
use crate::domain::pricing::Direction;
use crate::infrastructure::display::{DisplayState, DisplayStatus};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Price display status.
    pub display: DisplayInfo,
    /// Narration status.
    pub narration: NarrationInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A price is displayed.
    Healthy,
    /// Still waiting for the first price.
    Degraded,
    /// The feed failed.
    Unhealthy,
}

/// Display information.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayInfo {
    /// Display status.
    pub status: DisplayStatus,
    /// Last displayed price.
    pub price: Option<Decimal>,
    /// Direction of the last move.
    pub direction: Direction,
    /// Frames rendered since start.
    pub frames_rendered: u64,
    /// Departing prices still on screen.
    pub departing: usize,
}

/// Narration information.
#[derive(Debug, Clone, Serialize)]
pub struct NarrationInfo {
    /// Whether the voice toggle is on.
    pub enabled: bool,
    /// Engine state, absent when no engine is configured.
    pub state: Option<NarrationState>,
}

/// Voice toggle position, returned and accepted by `/voice`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSetting {
    /// Whether narration is on.
    pub enabled: bool,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    display: Arc<DisplayState>,
    voice: Arc<VoiceToggle>,
    narration: Option<Arc<NarrationEngine>>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(
        version: String,
        display: Arc<DisplayState>,
        voice: Arc<VoiceToggle>,
        narration: Option<Arc<NarrationEngine>>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            display,
            voice,
            narration,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Build the router.
    pub fn router(state: Arc<HealthServerState>) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .route("/price", get(price_handler))
            .route("/voice", get(voice_handler).put(set_voice_handler))
            .route("/voice/toggle", post(toggle_voice_handler))
            .with_state(state)
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Self::router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.display.status() == DisplayStatus::Live {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

async fn price_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    Json(state.display.snapshot())
}

async fn voice_handler(State(state): State<Arc<HealthServerState>>) -> Json<VoiceSetting> {
    Json(VoiceSetting {
        enabled: state.voice.is_enabled(),
    })
}

async fn set_voice_handler(
    State(state): State<Arc<HealthServerState>>,
    Json(setting): Json<VoiceSetting>,
) -> Json<VoiceSetting> {
    state.voice.set(setting.enabled);
    tracing::info!(enabled = setting.enabled, "Voice narration set");
    Json(setting)
}

async fn toggle_voice_handler(State(state): State<Arc<HealthServerState>>) -> Json<VoiceSetting> {
    let enabled = state.voice.toggle();
    tracing::info!(enabled, "Voice narration toggled");
    Json(VoiceSetting { enabled })
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let snapshot = state.display.snapshot();

    HealthResponse {
        status: determine_health_status(snapshot.status),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        display: DisplayInfo {
            status: snapshot.status,
            price: snapshot.frame.price,
            direction: snapshot.frame.direction,
            frames_rendered: snapshot.frames_rendered,
            departing: snapshot.departing.len(),
        },
        narration: NarrationInfo {
            enabled: state.voice.is_enabled(),
            state: state.narration.as_ref().map(|engine| engine.state()),
        },
    }
}

const fn determine_health_status(display: DisplayStatus) -> HealthStatus {
    match display {
        DisplayStatus::Live => HealthStatus::Healthy,
        DisplayStatus::Loading => HealthStatus::Degraded,
        DisplayStatus::Unavailable => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
