use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{Extensions, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bb_core::config::DetectorConfig;
use bb_model::{ModelError, ModelSlot};
use bb_telemetry::TelemetryReporter;
use serde_json::json;

use crate::detector::{DetectError, Detector};
use crate::hotreload::spawn_config_watcher;
use crate::response::{DetectResponse, ErrorResponse};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub detector: Arc<Detector>,
    pub telemetry: Arc<TelemetryReporter>,
}

/// Build the HTTP router.
///
/// Bodies above `max_body_bytes` are rejected with 413 before the handler
/// runs.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/detectar", post(detect))
        .route("/detect", post(detect))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn index() -> &'static str {
    "BugBeats detector online"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model": state.detector.model_status(),
    }))
}

/// Failure of one `/detectar` request.
enum ApiError {
    Detect(DetectError),
    Body(BytesRejection),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Detect(DetectError::NotReady(s)) if s.state == "loading" => {
                (StatusCode::SERVICE_UNAVAILABLE, ErrorResponse::loading())
            }
            Self::Detect(DetectError::NotReady(s)) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::error(format!(
                    "MODELO NO DISPONIBLE: {}",
                    s.error.unwrap_or_default()
                )),
            ),
            Self::Detect(DetectError::Audio(e)) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::error(e.to_string()))
            }
            Self::Detect(DetectError::Model(e @ ModelError::InputShape { .. })) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::error(e.to_string()),
            ),
            Self::Detect(DetectError::Model(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::error(e.to_string()),
            ),
            Self::Body(rejection) => (rejection.status(), ErrorResponse::error(rejection.body_text())),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorResponse::error(msg)),
        };
        (status, Json(body)).into_response()
    }
}

async fn detect(
    State(state): State<AppState>,
    extensions: Extensions,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let remote = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.to_string());

    let body = body.map_err(|rejection| {
        log::warn!("Rejected upload from {remote}: {}", rejection.body_text());
        ApiError::Body(rejection)
    })?;
    log::info!("Clip from {remote}: {} bytes", body.len());

    let detector = Arc::clone(&state.detector);
    let outcome = tokio::task::spawn_blocking(move || detector.detect(&body))
        .await
        .map_err(|e| ApiError::Internal(format!("detector task failed: {e}")))?;

    let detection = outcome.map_err(|e| {
        log::warn!("Detection failed for {remote}: {e}");
        ApiError::Detect(e)
    })?;

    log::info!(
        "{remote}: {:?} via {} (confidence {:.3}, rms {:.4}, centroid {:.0}Hz)",
        detection.verdict,
        detection.stage.as_str(),
        detection.confidence,
        detection.rms,
        detection.centroid_hz
    );
    state.telemetry.report(&detection);

    Ok(Json(DetectResponse::from(&detection)))
}

/// Start everything and serve until Ctrl-C.
///
/// `overrides` re-applies the command-line flags on every config reload.
///
/// # Errors
/// Returns an error if the model thread, the telemetry task or the listener
/// cannot be started.
pub async fn serve<F>(config: DetectorConfig, config_path: &Path, overrides: F) -> Result<()>
where
    F: Fn(&mut DetectorConfig) + Send + 'static,
{
    let (slot, _loader) = ModelSlot::spawn_loader(&config.model.path, config.audio.feature_len())
        .context("Cannot spawn model loader")?;

    let shared = Arc::new(ArcSwap::from_pointee(config.clone()));
    let _watcher = if config_path.exists() {
        Some(spawn_config_watcher(config_path, &shared, overrides)?)
    } else {
        None
    };

    let (telemetry, _sender) =
        TelemetryReporter::spawn(&config.telemetry).context("Invalid telemetry settings")?;

    let state = AppState {
        detector: Arc::new(Detector::new(config.audio.clone(), slot, shared)),
        telemetry: Arc::new(telemetry),
    };
    let app = router(state, config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;
    log::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server error")?;

    log::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
