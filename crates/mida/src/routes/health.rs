//! Health check endpoints.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check (is the server running?)
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    store: bool,
    captcha: bool,
}

/// Readiness check (is the session store reachable and can text
/// challenges be drawn?)
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    let captcha = state.text_generator.has_font();
    if state.sessions.ping().await && captcha {
        Ok(Json(ReadyResponse {
            status: "ready",
            store: true,
            captcha,
        }))
    } else {
        // Return 503 if not ready
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
