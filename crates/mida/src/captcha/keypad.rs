//! Scrambled digit keypad widgets (date, birth date, number).
//!
//! Every widget instance lays its ten digit keys out in a fresh random
//! permutation, so replaying fixed click coordinates cannot type the answer.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use mida_common::CaptchaKind;
use mida_common::constants::{NUMBER_LENGTH, WRONG_ANSWER_RESET_MS};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{Outcome, WidgetPhase};

/// Control keys sharing the bottom row with the tenth digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAction {
    Backspace,
    Clear,
}

/// A keypad button. Digits serialize as numbers, actions as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Digit(u8),
    Action(KeyAction),
}

/// 4x3 keypad: three rows of shuffled digits, then `[backspace, d9, clear]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    rows: [[Key; 3]; 4],
}

impl Keypad {
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut digits: [u8; 10] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9];
        digits.shuffle(rng);
        Self::from_digits(digits)
    }

    /// Build a keypad from an explicit digit order
    pub fn from_digits(d: [u8; 10]) -> Self {
        let k = Key::Digit;
        Self {
            rows: [
                [k(d[0]), k(d[1]), k(d[2])],
                [k(d[3]), k(d[4]), k(d[5])],
                [k(d[6]), k(d[7]), k(d[8])],
                [Key::Action(KeyAction::Backspace), k(d[9]), Key::Action(KeyAction::Clear)],
            ],
        }
    }

    pub fn rows(&self) -> &[[Key; 3]; 4] {
        &self.rows
    }

    /// Digits in layout order (row-major)
    pub fn digits(&self) -> Vec<u8> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|key| match key {
                Key::Digit(d) => Some(*d),
                Key::Action(_) => None,
            })
            .collect()
    }
}

/// Field widths and joiner of a keypad widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    /// Day (2), month (2), year (4), joined as `DD/MM/YYYY`
    Date,
    /// One six-digit field
    Number,
}

impl InputLayout {
    fn widths(&self) -> &'static [usize] {
        match self {
            Self::Date => &[2, 2, 4],
            Self::Number => &[NUMBER_LENGTH],
        }
    }

    fn separator(&self) -> &'static str {
        match self {
            Self::Date => "/",
            Self::Number => "",
        }
    }
}

/// Format a date the way the date widgets expect it
pub fn date_literal(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Replace `.` and whitespace separators with `/`
pub fn normalize_expected(expected: &str) -> String {
    expected
        .chars()
        .map(|c| if c == '.' || c.is_whitespace() { '/' } else { c })
        .collect()
}

/// Snapshot of a keypad widget for rendering
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeypadView {
    pub kind: CaptchaKind,
    pub keypad: Keypad,
    pub fields: Vec<String>,
    pub error: Option<&'static str>,
    /// Shown to the user by the number widget only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_target: Option<String>,
}

/// A scrambled-keypad widget instance
#[derive(Debug, Clone)]
pub struct KeypadWidget {
    kind: CaptchaKind,
    layout: InputLayout,
    keypad: Keypad,
    fields: Vec<String>,
    expected: String,
    phase: WidgetPhase,
    error: Option<&'static str>,
}

impl KeypadWidget {
    /// Today's-date widget
    pub fn date<R: Rng + ?Sized>(expected: &str, rng: &mut R) -> Self {
        Self::new(CaptchaKind::Date, InputLayout::Date, expected, rng)
    }

    /// Birth-date widget
    pub fn birth_date<R: Rng + ?Sized>(expected: &str, rng: &mut R) -> Self {
        Self::new(CaptchaKind::Birthdate, InputLayout::Date, expected, rng)
    }

    /// Number widget with a fresh six-digit target
    pub fn number<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let target = rng.random_range(100_000..=999_999u32).to_string();
        Self::new(CaptchaKind::Number, InputLayout::Number, &target, rng)
    }

    pub fn new<R: Rng + ?Sized>(
        kind: CaptchaKind,
        layout: InputLayout,
        expected: &str,
        rng: &mut R,
    ) -> Self {
        Self {
            kind,
            layout,
            keypad: Keypad::shuffled(rng),
            fields: vec![String::new(); layout.widths().len()],
            expected: normalize_expected(expected),
            phase: WidgetPhase::Entering,
            error: None,
        }
    }

    pub fn kind(&self) -> CaptchaKind {
        self.kind
    }

    pub fn keypad(&self) -> &Keypad {
        &self.keypad
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn phase(&self) -> WidgetPhase {
        self.phase
    }

    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    /// The six digits the number widget asks the user to type
    pub fn display_target(&self) -> Option<&str> {
        match self.layout {
            InputLayout::Number => Some(&self.expected),
            InputLayout::Date => None,
        }
    }

    pub fn view(&self) -> KeypadView {
        KeypadView {
            kind: self.kind,
            keypad: self.keypad.clone(),
            fields: self.fields.clone(),
            error: self.error,
            display_target: self.display_target().map(str::to_string),
        }
    }

    /// Handle one key press. Returns an outcome when the last field fills.
    ///
    /// Keys are ignored once the widget accepted, and while a rejection is
    /// on screen (until [`tick`](Self::tick) clears it).
    pub fn press(&mut self, key: Key, now: DateTime<Utc>) -> Option<Outcome> {
        if self.phase != WidgetPhase::Entering {
            return None;
        }

        match key {
            Key::Digit(d) if d <= 9 => {
                self.error = None;
                let widths = self.layout.widths();
                if let Some((field, _)) = self
                    .fields
                    .iter_mut()
                    .zip(widths)
                    .find(|(field, width)| field.len() < **width)
                {
                    field.push(char::from(b'0' + d));
                }
                self.evaluate(now)
            }
            Key::Digit(_) => None,
            Key::Action(KeyAction::Backspace) => {
                self.error = None;
                if let Some(field) = self.fields.iter_mut().rev().find(|f| !f.is_empty()) {
                    field.pop();
                }
                None
            }
            Key::Action(KeyAction::Clear) => {
                self.clear();
                None
            }
        }
    }

    /// Advance timers. Returns true when a rejected entry was cleared.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        match self.phase {
            WidgetPhase::Rejected { retry_at } if now >= retry_at => {
                self.clear();
                self.phase = WidgetPhase::Entering;
                true
            }
            _ => false,
        }
    }

    fn clear(&mut self) {
        self.fields.iter_mut().for_each(String::clear);
        self.error = None;
    }

    fn is_full(&self) -> bool {
        self.fields
            .iter()
            .zip(self.layout.widths())
            .all(|(field, width)| field.len() == *width)
    }

    fn evaluate(&mut self, now: DateTime<Utc>) -> Option<Outcome> {
        if !self.is_full() {
            return None;
        }

        let entered = self.fields.join(self.layout.separator());
        if entered == self.expected {
            self.phase = WidgetPhase::Accepted;
            tracing::debug!(kind = %self.kind, "Keypad widget accepted");
            Some(Outcome::Correct)
        } else {
            self.phase = WidgetPhase::Rejected {
                retry_at: now + Duration::milliseconds(WRONG_ANSWER_RESET_MS),
            };
            self.error = Some(match self.layout {
                InputLayout::Date => "The date was entered incorrectly",
                InputLayout::Number => "The number was entered incorrectly",
            });
            tracing::debug!(kind = %self.kind, "Keypad widget rejected entry");
            Some(Outcome::Incorrect)
        }
    }
}
