//! HTTP route handlers for the MİDA server.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mida_common::MidaError;
use serde::Serialize;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::state::AppState;

mod captcha;
mod chapca;
mod health;
mod plans;
mod sessions;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Widgets
        .route("/captcha/keypad", get(captcha::keypad))
        .route("/captcha/number", get(captcha::number))
        .route("/captcha/text", get(captcha::text_challenge))
        .route("/captcha/text/verify", post(captcha::verify_text))

        // Plans
        .route("/plans/chapca", post(plans::chapca_plan))
        .route("/plans/sales", post(plans::sales_plan))

        // Chapca flows
        .route("/chapca", post(chapca::start_flow))
        .route("/chapca/{id}", get(chapca::get_flow).delete(chapca::abandon_flow))
        .route("/chapca/{id}/attempts", post(chapca::record_attempt))
        .route("/chapca/{id}/save", post(chapca::retry_save))

        // Session history
        .route("/sessions/aim", post(sessions::save_aim))
        .route("/sessions/sales", post(sessions::save_sales))
        .route("/sessions/{collection}/{email}", get(sessions::list_sessions))

        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())

        // Add shared state
        .with_state(state)
}

/// Error body returned by every handler
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    retryable: bool,
}

/// Handler error, rendered from [`MidaError`]
#[derive(Debug)]
pub struct ApiError(pub MidaError);

impl From<MidaError> for ApiError {
    fn from(e: MidaError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self.0 {
            MidaError::Config(_) => "config",
            MidaError::Store(_) => "store",
            MidaError::Query(_) => "query",
            MidaError::Captcha(_) => "captcha",
            MidaError::InvalidInput(_) => "invalid_input",
            MidaError::NotFound(_) => "not_found",
            MidaError::Conflict(_) => "conflict",
            MidaError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        let body = ErrorBody {
            error: self.kind(),
            // Query failures carry the raw store message for the error panel
            message: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// Sessions are owned by an email address; reject obviously malformed ones
fn require_email(email: &str) -> Result<(), MidaError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((user, domain)) if !user.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(MidaError::InvalidInput(format!("'{}' is not an email address", email))),
    }
}
