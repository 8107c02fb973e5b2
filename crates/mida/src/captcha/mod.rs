//! CAPTCHA widgets, rendering, and server-side text challenges.
//!
//! Widgets are plain state machines: they own their input, report an
//! [`Outcome`] once per submission, and restart themselves after a wrong
//! answer when [`tick`](KeypadWidget::tick) passes the retry deadline.

mod generator;
mod keypad;
mod render;
mod text;
mod verifier;

pub use generator::TextChallengeGenerator;
pub use keypad::{
    InputLayout, Key, KeyAction, Keypad, KeypadView, KeypadWidget, date_literal,
    normalize_expected,
};
pub use render::TextRenderer;
pub use text::{TextWidget, random_text};
pub use verifier::TextChallengeVerifier;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one submission, passed to the orchestrator's verify callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// Issued text challenge as kept by the challenge store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChallenge {
    /// Expected answer, lowercase
    pub answer: String,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    pub expires_at: i64,
}

/// Input phase of a widget instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetPhase {
    /// Accepting input
    Entering,
    /// Wrong answer on screen; restarts at `retry_at`
    Rejected { retry_at: DateTime<Utc> },
    /// Verified; input is frozen
    Accepted,
}
