//! Widget endpoints: keypad layouts and server-verified text challenges.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use mida_common::{MidaError, TextChallenge, VerifyResult};
use crate::captcha::{Keypad, KeypadView, KeypadWidget};
use crate::routes::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct KeypadResponse {
    keypad: Keypad,
}

/// Fresh shuffled keypad for a date or birth-date widget
pub async fn keypad() -> Json<KeypadResponse> {
    let keypad = Keypad::shuffled(&mut rand::rng());
    Json(KeypadResponse { keypad })
}

/// Number widget: shuffled keypad plus the six digits to type
pub async fn number() -> Json<KeypadView> {
    let widget = KeypadWidget::number(&mut rand::rng());
    Json(widget.view())
}

/// Generate a new distorted-text challenge
pub async fn text_challenge(State(state): State<AppState>) -> ApiResult<TextChallenge> {
    let challenge = state
        .text_generator
        .generate(state.challenges.as_ref(), state.now())
        .await?;
    Ok(Json(challenge))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    challenge_id: String,
    answer: String,
}

/// Verify a text challenge answer (each challenge checks once)
pub async fn verify_text(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> ApiResult<VerifyResult> {
    if payload.challenge_id.is_empty() {
        return Err(MidaError::InvalidInput("challengeId is required".to_string()).into());
    }

    tracing::debug!(challenge_id = %payload.challenge_id, "Verifying text challenge");

    let result = state
        .text_verifier
        .verify(
            state.challenges.as_ref(),
            &payload.challenge_id,
            &payload.answer,
            state.now(),
        )
        .await?;
    Ok(Json(result))
}
