//! Distorted-text widget state.

use chrono::{DateTime, Duration, Utc};
use mida_common::constants::{TEXT_CHARSET, TEXT_LENGTH, WRONG_ANSWER_RESET_MS};
use rand::Rng;

use super::{Outcome, WidgetPhase};

/// Random text from the unambiguous lowercase/digit alphabet
pub fn random_text<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| TEXT_CHARSET[rng.random_range(0..TEXT_CHARSET.len())] as char)
        .collect()
}

/// A distorted-text widget instance.
///
/// Unlike the keypad widgets, a full input is not checked automatically:
/// the user has to [`confirm`](Self::confirm).
#[derive(Debug, Clone)]
pub struct TextWidget {
    answer: String,
    input: String,
    phase: WidgetPhase,
    error: Option<&'static str>,
    generation: u32,
}

impl TextWidget {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_answer(random_text(rng, TEXT_LENGTH))
    }

    pub fn with_answer(answer: String) -> Self {
        Self {
            answer,
            input: String::new(),
            phase: WidgetPhase::Entering,
            error: None,
            generation: 0,
        }
    }

    /// Text to render
    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn phase(&self) -> WidgetPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    /// Bumped on every regeneration; the image must be re-rendered
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Replace the typed text. Longer than five characters is refused.
    pub fn set_input(&mut self, value: &str) -> bool {
        if self.phase != WidgetPhase::Entering || value.chars().count() > TEXT_LENGTH {
            return false;
        }
        self.error = None;
        self.input = value.to_string();
        true
    }

    pub fn can_confirm(&self) -> bool {
        self.phase == WidgetPhase::Entering && self.input.chars().count() == TEXT_LENGTH
    }

    /// Check the typed text, case-insensitively
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Option<Outcome> {
        if !self.can_confirm() {
            return None;
        }

        if self.input.to_lowercase() == self.answer.to_lowercase() {
            self.phase = WidgetPhase::Accepted;
            Some(Outcome::Correct)
        } else {
            self.phase = WidgetPhase::Rejected {
                retry_at: now + Duration::milliseconds(WRONG_ANSWER_RESET_MS),
            };
            self.error = Some("The text was entered incorrectly");
            Some(Outcome::Incorrect)
        }
    }

    /// After the retry delay, clear input and draw a brand-new text.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> bool {
        match self.phase {
            WidgetPhase::Rejected { retry_at } if now >= retry_at => {
                self.answer = random_text(rng, TEXT_LENGTH);
                self.input.clear();
                self.error = None;
                self.phase = WidgetPhase::Entering;
                self.generation += 1;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_text_alphabet() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let text = random_text(&mut rng, TEXT_LENGTH);
            assert_eq!(text.len(), 5);
            assert!(text.bytes().all(|b| TEXT_CHARSET.contains(&b)));
            assert!(!text.contains('o') && !text.contains('l'));
        }
    }

    #[test]
    fn test_confirm_is_explicit_and_case_insensitive() {
        let now = Utc::now();
        let mut widget = TextWidget::with_answer("ab3cd".to_string());

        assert!(widget.set_input("AB3C"));
        assert_eq!(widget.confirm(now), None);

        assert!(widget.set_input("AB3CD"));
        assert_eq!(widget.phase(), WidgetPhase::Entering);
        assert_eq!(widget.confirm(now), Some(Outcome::Correct));
    }

    #[test]
    fn test_input_is_capped() {
        let mut widget = TextWidget::with_answer("ab3cd".to_string());
        assert!(!widget.set_input("abcdef"));
        assert_eq!(widget.input(), "");
    }

    #[test]
    fn test_wrong_text_regenerates_after_delay() {
        let mut rng = StdRng::seed_from_u64(12);
        let now = Utc::now();
        let mut widget = TextWidget::with_answer("ab3cd".to_string());

        widget.set_input("zzzzz");
        assert_eq!(widget.confirm(now), Some(Outcome::Incorrect));
        assert!(widget.error().is_some());
        assert!(!widget.set_input("ab3cd"));

        assert!(!widget.tick(now + Duration::milliseconds(1000), &mut rng));
        assert!(widget.tick(now + Duration::milliseconds(1500), &mut rng));
        assert_eq!(widget.generation(), 1);
        assert_eq!(widget.input(), "");
        assert!(widget.error().is_none());
        assert_eq!(widget.answer().len(), 5);
    }
}
