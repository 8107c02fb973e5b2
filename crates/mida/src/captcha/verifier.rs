//! Text challenge verification.

use chrono::{DateTime, Utc};
use mida_common::{MidaError, VerifyResult};

use crate::store::ChallengeStore;

/// Text challenge verifier service
#[derive(Default)]
pub struct TextChallengeVerifier;

impl TextChallengeVerifier {
    pub fn new() -> Self {
        Self
    }

    /// Verify an answer. Every challenge can be checked exactly once,
    /// whatever the outcome.
    pub async fn verify(
        &self,
        store: &dyn ChallengeStore,
        challenge_id: &str,
        user_answer: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifyResult, MidaError> {
        let Some(challenge) = store.take_challenge(challenge_id).await? else {
            return Ok(rejected("Challenge expired or invalid"));
        };

        if now.timestamp() > challenge.expires_at {
            return Ok(rejected("Challenge expired"));
        }

        if user_answer.to_lowercase() == challenge.answer.to_lowercase() {
            tracing::info!(challenge_id = %challenge_id, "Text challenge verified");
            Ok(VerifyResult {
                success: true,
                error_message: None,
            })
        } else {
            tracing::debug!(challenge_id = %challenge_id, "Text challenge failed");
            Ok(rejected("The text was entered incorrectly"))
        }
    }
}

fn rejected(message: &str) -> VerifyResult {
    VerifyResult {
        success: false,
        error_message: Some(message.to_string()),
    }
}
