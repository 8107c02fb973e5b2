//! Core types shared across MİDA components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MidaError;

/// The four verification widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaKind {
    /// Today's date on a scrambled keypad
    Date,
    /// Birth date on a scrambled keypad
    Birthdate,
    /// Distorted text image
    Text,
    /// Six-digit number on a scrambled keypad
    Number,
}

impl CaptchaKind {
    pub const ALL: [CaptchaKind; 4] = [Self::Date, Self::Birthdate, Self::Text, Self::Number];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Birthdate => "birthdate",
            Self::Text => "text",
            Self::Number => "number",
        }
    }
}

impl fmt::Display for CaptchaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the chapca flow orders the expanded selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderMode {
    /// All repeats of each kind, in selection order
    #[default]
    Sequential,
    /// Full shuffle of the expanded multiset
    Random,
}

/// Where a sales-wizard captcha is shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Sidebar,
    Modal,
}

/// One planned captcha in the sales wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub kind: CaptchaKind,
    /// Wizard step (1 or 2)
    pub step: u8,
    pub placement: Placement,
}

/// Aim trainer game modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameMode {
    /// Click targets to score points
    #[default]
    Normal,
    /// Drag targets to the centre to score
    DragDrop,
    /// Two targets spawn at once
    DualTargets,
    /// Targets bounce around the arena
    MovingTargets,
}

impl GameMode {
    pub fn spawn_count(&self) -> usize {
        match self {
            Self::DualTargets => 2,
            _ => 1,
        }
    }
}

/// Round a millisecond duration to whole seconds
pub fn rounded_seconds(duration_ms: i64) -> i64 {
    (duration_ms as f64 / 1000.0).round() as i64
}

/// One widget verification inside a chapca session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    #[serde(rename = "type")]
    pub kind: CaptchaKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Milliseconds
    pub duration: i64,
    pub duration_seconds: i64,
    pub is_correct: bool,
}

impl Attempt {
    pub fn new(
        kind: CaptchaKind,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        is_correct: bool,
    ) -> Self {
        let duration = (end_time - start_time).num_milliseconds();
        Self {
            kind,
            start_time,
            end_time,
            duration,
            duration_seconds: rounded_seconds(duration),
            is_correct,
        }
    }
}

/// A finished (or abandoned) chapca run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapcaSession {
    pub email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Milliseconds
    pub total_duration: i64,
    pub total_duration_seconds: i64,
    pub attempts: Vec<Attempt>,
    /// Assigned by the server on write
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// A finished aim trainer game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AimSession {
    pub email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Milliseconds
    pub total_duration: i64,
    pub total_duration_seconds: i64,
    pub game_mode: GameMode,
    pub score: u32,
    pub misses: u32,
    pub expired_targets: u32,
    /// Percentage, one decimal
    pub accuracy: f64,
    pub level: u32,
    /// Assigned by the server on write
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// A finished sales-wizard simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSession {
    pub email: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Milliseconds
    pub total_duration: i64,
    pub total_duration_seconds: i64,
    /// Seconds
    pub step1_duration: f64,
    /// Seconds
    pub step2_duration: f64,
    /// Seconds spent on solved captchas
    pub captcha_duration: f64,
    pub correct_captchas: u32,
    pub incorrect_captchas: u32,
    pub project: String,
    /// Assigned by the server on write
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Documents that can be listed newest-first by owner
pub trait SessionDocument {
    fn owner(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! session_document {
    ($($ty:ty),+) => {
        $(impl SessionDocument for $ty {
            fn owner(&self) -> &str {
                &self.email
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        })+
    };
}

session_document!(ChapcaSession, AimSession, SalesSession);

/// A persisted document with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub doc: T,
}

/// One page of newest-first results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next page (the last item's position)
    pub next_cursor: Option<String>,
    /// `items.len() == page_size`; a full last page still reports `true`
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page_size: usize, next_cursor: Option<String>) -> Self {
        let has_more = page_size > 0 && items.len() == page_size;
        Self {
            items,
            next_cursor,
            has_more,
        }
    }
}

/// Logical session collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    #[serde(rename = "chapcaSessions")]
    Chapca,
    #[serde(rename = "aimSessions")]
    Aim,
    #[serde(rename = "salesSessions")]
    Sales,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chapca => "chapcaSessions",
            Self::Aim => "aimSessions",
            Self::Sales => "salesSessions",
        }
    }
}

impl FromStr for Collection {
    type Err = MidaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chapcaSessions" | "chapca" => Ok(Self::Chapca),
            "aimSessions" | "aim" => Ok(Self::Aim),
            "salesSessions" | "sales" => Ok(Self::Sales),
            other => Err(MidaError::NotFound(format!("collection '{}'", other))),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distorted-text challenge sent to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChallenge {
    /// Unique challenge ID
    pub challenge_id: String,

    /// `data:image/png;base64,...`
    pub image_data: String,

    /// Characters expected
    pub length: usize,

    /// Challenge expiry timestamp (Unix seconds)
    pub expires_at: i64,
}

/// Result of a text challenge verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_attempt_durations() {
        let start = Utc.timestamp_millis_opt(1_000).unwrap();
        let end = Utc.timestamp_millis_opt(3_600).unwrap();
        let attempt = Attempt::new(CaptchaKind::Date, start, end, true);
        assert_eq!(attempt.duration, 2_600);
        assert_eq!(attempt.duration_seconds, 3);
    }

    #[test]
    fn test_attempt_wire_format() {
        let t = Utc.timestamp_millis_opt(0).unwrap();
        let attempt = Attempt::new(CaptchaKind::Birthdate, t, t, false);
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["type"], "birthdate");
        assert_eq!(json["isCorrect"], false);
        assert!(json.get("durationSeconds").is_some());
    }

    #[test]
    fn test_page_has_more_is_count_based() {
        let full: Page<u8> = Page::new(vec![1, 2, 3], 3, Some("c".into()));
        assert!(full.has_more);
        let short: Page<u8> = Page::new(vec![1, 2], 3, Some("c".into()));
        assert!(!short.has_more);
    }

    #[test]
    fn test_collection_parsing() {
        assert_eq!("aimSessions".parse::<Collection>().unwrap(), Collection::Aim);
        assert_eq!("sales".parse::<Collection>().unwrap(), Collection::Sales);
        assert!("users".parse::<Collection>().is_err());
    }

    #[test]
    fn test_game_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&GameMode::DragDrop).unwrap(),
            "\"drag-drop\""
        );
        assert_eq!(GameMode::DualTargets.spawn_count(), 2);
    }
}
