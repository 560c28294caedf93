use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tracing::{info, warn};

use crate::sync::{ControlSender, IngestError, StatusHandle};

/// Operator-facing controls for the ingest job.
#[derive(Clone)]
pub struct AppState {
    pub control: ControlSender,
    pub status: StatusHandle,
    pub status_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Hi" }))
        .route("/ingest/start", post(start_ingest))
        .route("/ingest/stop", post(stop_ingest))
        .route("/ingest/status", get(ingest_status))
        .with_state(state)
}

async fn start_ingest(State(state): State<AppState>) -> (StatusCode, String) {
    info!("Received ingest start request");
    control_response(state.control.begin(), "Ingest job requested")
}

async fn stop_ingest(State(state): State<AppState>) -> (StatusCode, String) {
    info!("Received ingest stop request");
    control_response(state.control.abort(), "Ingest job cancellation requested")
}

async fn ingest_status(State(state): State<AppState>) -> (StatusCode, String) {
    match tokio::time::timeout(state.status_timeout, state.status.status()).await {
        Ok(Ok(report)) => (StatusCode::OK, report),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        Err(_) => {
            warn!("Timed out waiting for ingest status");
            (
                StatusCode::GATEWAY_TIMEOUT,
                "Timed out waiting for ingest status".to_string(),
            )
        }
    }
}

fn control_response(result: Result<(), IngestError>, accepted: &str) -> (StatusCode, String) {
    match result {
        Ok(()) => (StatusCode::ACCEPTED, accepted.to_string()),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}
