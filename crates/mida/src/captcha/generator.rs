//! Server-issued text challenges.
//!
//! The answer never leaves the server: the client gets the rendered image
//! and an id, and submits its guess to the verifier.

use chrono::{DateTime, Utc};
use mida_common::constants::TEXT_LENGTH;
use mida_common::{MidaError, TextChallenge};
use std::sync::Arc;

use super::{StoredChallenge, TextRenderer, random_text};
use crate::store::{ChallengeStore, generate_id};

/// Text challenge generator service
pub struct TextChallengeGenerator {
    /// Challenge TTL in seconds
    pub challenge_ttl: u64,
    renderer: Arc<TextRenderer>,
}

impl TextChallengeGenerator {
    pub fn new(challenge_ttl: u64, renderer: Arc<TextRenderer>) -> Self {
        Self {
            challenge_ttl,
            renderer,
        }
    }

    /// False when challenges would render without glyphs
    pub fn has_font(&self) -> bool {
        self.renderer.has_font()
    }

    /// Generate, render, and store a new challenge
    pub async fn generate(
        &self,
        store: &dyn ChallengeStore,
        now: DateTime<Utc>,
    ) -> Result<TextChallenge, MidaError> {
        if !self.has_font() {
            return Err(MidaError::Captcha("no glyph font loaded".to_string()));
        }

        let challenge_id = generate_id();
        let (answer, image_data) = {
            let mut rng = rand::rng();
            let answer = random_text(&mut rng, TEXT_LENGTH);
            let image_data = self.renderer.render_data_url(&answer, &mut rng)?;
            (answer, image_data)
        };

        let created_at = now.timestamp();
        let expires_at = created_at + self.challenge_ttl as i64;
        let stored = StoredChallenge {
            answer,
            created_at,
            expires_at,
        };
        store
            .put_challenge(&challenge_id, &stored, self.challenge_ttl)
            .await?;

        tracing::debug!(challenge_id = %challenge_id, "Generated text challenge");

        Ok(TextChallenge {
            challenge_id,
            image_data,
            length: TEXT_LENGTH,
            expires_at,
        })
    }
}
