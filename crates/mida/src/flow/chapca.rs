//! Standalone chapca exercise: a user-selected sequence of widgets played
//! one at a time, summarized into a single session document.

use chrono::{DateTime, Utc};
use mida_common::constants::MAX_REPEAT_COUNT;
use mida_common::{Attempt, CaptchaKind, ChapcaSession, MidaError, OrderMode};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::guard::{SaveGuard, SaveState};
use crate::captcha::normalize_expected;

/// Chapca exercise configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChapcaSettings {
    /// Kinds in selection order, without duplicates
    pub selection: Vec<CaptchaKind>,
    /// Repeats per kind; missing kinds play once
    pub counts: BTreeMap<CaptchaKind, u8>,
    pub order: OrderMode,
    /// Expected `DD/MM/YYYY` for the date widget
    pub expected_date: Option<String>,
    /// Expected `DD/MM/YYYY` for the birth-date widget
    pub birth_date: Option<String>,
}

impl ChapcaSettings {
    /// Repeat count for a kind, clamped to `1..=10`
    pub fn count(&self, kind: CaptchaKind) -> usize {
        self.counts
            .get(&kind)
            .copied()
            .unwrap_or(1)
            .clamp(1, MAX_REPEAT_COUNT) as usize
    }

    pub fn validate(&self) -> Result<(), MidaError> {
        if self.selection.is_empty() {
            return Err(MidaError::InvalidInput(
                "select at least one chapca".to_string(),
            ));
        }
        for (i, kind) in self.selection.iter().enumerate() {
            if self.selection[..i].contains(kind) {
                return Err(MidaError::InvalidInput(format!(
                    "'{}' is selected more than once",
                    kind
                )));
            }
        }
        if self.selection.contains(&CaptchaKind::Date) && blank(&self.expected_date) {
            return Err(MidaError::InvalidInput("expected date is not set".to_string()));
        }
        if self.selection.contains(&CaptchaKind::Birthdate) && blank(&self.birth_date) {
            return Err(MidaError::InvalidInput("birth date is not set".to_string()));
        }
        Ok(())
    }

    /// Expected literal for a keypad date widget
    pub fn expected_for(&self, kind: CaptchaKind) -> Option<String> {
        match kind {
            CaptchaKind::Date => self.expected_date.as_deref().map(normalize_expected),
            CaptchaKind::Birthdate => self.birth_date.as_deref().map(normalize_expected),
            CaptchaKind::Text | CaptchaKind::Number => None,
        }
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Expand the selection into the widget sequence
pub fn expand_plan<R: Rng + ?Sized>(settings: &ChapcaSettings, rng: &mut R) -> Vec<CaptchaKind> {
    let mut plan: Vec<CaptchaKind> = settings
        .selection
        .iter()
        .flat_map(|&kind| std::iter::repeat_n(kind, settings.count(kind)))
        .collect();

    if settings.order == OrderMode::Random {
        plan.shuffle(rng);
    }
    plan
}

/// Where a chapca flow is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state", content = "index")]
pub enum FlowStatus {
    NotStarted,
    InProgress(usize),
    /// Final attempt recorded; the session write is pending or failed
    Completing,
    Completed,
    Abandoned,
}

/// What a recorded outcome did to the flow
#[derive(Debug, Clone, PartialEq)]
pub enum ChapcaStep {
    /// Wrong answer; the current widget restarts
    Retry,
    /// Moved on to the widget at `index`
    Advanced { index: usize, kind: CaptchaKind },
    /// Sequence done. Carries the session to persist the first time only.
    Finished(Option<ChapcaSession>),
}

/// A single chapca playthrough
#[derive(Debug, Clone)]
pub struct ChapcaFlow {
    email: String,
    settings: ChapcaSettings,
    plan: Vec<CaptchaKind>,
    status: FlowStatus,
    started_at: Option<DateTime<Utc>>,
    widget_started_at: Option<DateTime<Utc>>,
    attempts: Vec<Attempt>,
    guard: SaveGuard,
    pending: Option<ChapcaSession>,
}

impl ChapcaFlow {
    pub fn new<R: Rng + ?Sized>(
        email: impl Into<String>,
        settings: ChapcaSettings,
        rng: &mut R,
    ) -> Result<Self, MidaError> {
        settings.validate()?;
        let plan = expand_plan(&settings, rng);
        Ok(Self {
            email: email.into(),
            settings,
            plan,
            status: FlowStatus::NotStarted,
            started_at: None,
            widget_started_at: None,
            attempts: Vec::new(),
            guard: SaveGuard::new(),
            pending: None,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn settings(&self) -> &ChapcaSettings {
        &self.settings
    }

    pub fn plan(&self) -> &[CaptchaKind] {
        &self.plan
    }

    pub fn status(&self) -> FlowStatus {
        self.status
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn save_state(&self) -> SaveState {
        self.guard.state()
    }

    /// Finished or abandoned with nothing left to write. Only settled
    /// flows may be dropped without losing a session.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, FlowStatus::Completed | FlowStatus::Abandoned)
            && matches!(self.guard.state(), SaveState::Idle | SaveState::Saved)
    }

    /// Widget currently on screen
    pub fn current(&self) -> Option<CaptchaKind> {
        match self.status {
            FlowStatus::InProgress(i) => self.plan.get(i).copied(),
            _ => None,
        }
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<CaptchaKind, MidaError> {
        if self.status != FlowStatus::NotStarted {
            return Err(MidaError::Conflict("flow already started".to_string()));
        }
        let first = *self
            .plan
            .first()
            .ok_or_else(|| MidaError::InvalidInput("empty chapca plan".to_string()))?;
        self.status = FlowStatus::InProgress(0);
        self.started_at = Some(now);
        self.widget_started_at = Some(now);
        Ok(first)
    }

    /// Record the outcome of the current widget
    pub fn record(&mut self, is_correct: bool, now: DateTime<Utc>) -> Result<ChapcaStep, MidaError> {
        let index = match self.status {
            FlowStatus::InProgress(i) => i,
            FlowStatus::Completing | FlowStatus::Completed => return Ok(ChapcaStep::Finished(None)),
            FlowStatus::NotStarted => {
                return Err(MidaError::Conflict("flow not started".to_string()));
            }
            FlowStatus::Abandoned => {
                return Err(MidaError::Conflict("flow was abandoned".to_string()));
            }
        };
        let kind = self.plan[index];
        let widget_start = self.widget_started_at.unwrap_or(now);
        self.attempts
            .push(Attempt::new(kind, widget_start, now, is_correct));

        if !is_correct {
            return Ok(ChapcaStep::Retry);
        }

        let next = index + 1;
        if next < self.plan.len() {
            self.status = FlowStatus::InProgress(next);
            self.widget_started_at = Some(now);
            return Ok(ChapcaStep::Advanced {
                index: next,
                kind: self.plan[next],
            });
        }

        self.status = FlowStatus::Completing;
        self.widget_started_at = None;
        Ok(ChapcaStep::Finished(self.claim_write(now)))
    }

    /// Leave the flow. Yields a partial session if anything was recorded.
    pub fn abandon(&mut self, now: DateTime<Utc>) -> Option<ChapcaSession> {
        match self.status {
            FlowStatus::NotStarted => {
                self.status = FlowStatus::Abandoned;
                None
            }
            FlowStatus::InProgress(_) => {
                self.status = FlowStatus::Abandoned;
                if self.attempts.is_empty() {
                    None
                } else {
                    self.claim_write(now)
                }
            }
            _ => None,
        }
    }

    pub fn save_succeeded(&mut self) {
        self.guard.succeed();
        self.pending = None;
        if self.status == FlowStatus::Completing {
            self.status = FlowStatus::Completed;
        }
    }

    pub fn save_failed(&mut self) {
        self.guard.fail();
    }

    /// The same session again after a failed write
    pub fn retry_save(&mut self) -> Option<ChapcaSession> {
        if self.guard.retry() {
            self.pending.clone()
        } else {
            None
        }
    }

    fn claim_write(&mut self, now: DateTime<Utc>) -> Option<ChapcaSession> {
        let started_at = self.started_at?;
        if !self.guard.begin() {
            return None;
        }
        let total = (now - started_at).num_milliseconds();
        let session = ChapcaSession {
            email: self.email.clone(),
            start_time: started_at,
            end_time: now,
            total_duration: total,
            total_duration_seconds: mida_common::rounded_seconds(total),
            attempts: self.attempts.clone(),
            created_at: now,
        };
        self.pending = Some(session.clone());
        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use CaptchaKind::*;

    fn settings(order: OrderMode) -> ChapcaSettings {
        ChapcaSettings {
            selection: vec![Date, Text],
            counts: BTreeMap::from([(Date, 2), (Text, 1)]),
            order,
            expected_date: Some("25.08.1990".to_string()),
            birth_date: None,
        }
    }

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    #[test]
    fn test_sequential_plan() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            expand_plan(&settings(OrderMode::Sequential), &mut rng),
            vec![Date, Date, Text]
        );
    }

    #[test]
    fn test_counts_are_clamped() {
        let mut s = settings(OrderMode::Sequential);
        s.counts.insert(Date, 0);
        s.counts.insert(Text, 40);
        assert_eq!(s.count(Date), 1);
        assert_eq!(s.count(Text), 10);
    }

    #[test]
    fn test_validation() {
        let mut rng = StdRng::seed_from_u64(2);
        let empty = ChapcaSettings::default();
        assert!(ChapcaFlow::new("a@mida.az", empty, &mut rng).is_err());

        let mut missing_date = settings(OrderMode::Sequential);
        missing_date.expected_date = Some("  ".to_string());
        assert!(matches!(
            ChapcaFlow::new("a@mida.az", missing_date, &mut rng),
            Err(MidaError::InvalidInput(_))
        ));

        let s = settings(OrderMode::Sequential);
        assert_eq!(s.expected_for(Date).as_deref(), Some("25/08/1990"));
    }

    proptest! {
        #[test]
        fn prop_random_plan_keeps_multiset(seed in any::<u64>(), a in 0u8..12, b in 0u8..12) {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut s = settings(OrderMode::Random);
            s.counts = BTreeMap::from([(Date, a), (Text, b)]);
            let plan = expand_plan(&s, &mut rng);

            let dates = plan.iter().filter(|k| **k == Date).count();
            let texts = plan.iter().filter(|k| **k == Text).count();
            prop_assert_eq!(dates, s.count(Date));
            prop_assert_eq!(texts, s.count(Text));
            prop_assert_eq!(plan.len(), dates + texts);
        }
    }

    #[test]
    fn test_full_run_yields_one_session() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut flow = ChapcaFlow::new("a@mida.az", settings(OrderMode::Sequential), &mut rng).unwrap();
        assert_eq!(flow.start(at(0)).unwrap(), Date);

        assert_eq!(flow.record(false, at(2_000)).unwrap(), ChapcaStep::Retry);
        assert_eq!(
            flow.record(true, at(3_000)).unwrap(),
            ChapcaStep::Advanced { index: 1, kind: Date }
        );
        flow.record(true, at(4_000)).unwrap();

        let ChapcaStep::Finished(Some(session)) = flow.record(true, at(6_500)).unwrap() else {
            panic!("expected a session to persist");
        };
        assert_eq!(flow.save_state(), SaveState::Saving);
        assert_eq!(session.attempts.len(), 4);
        assert!(session.attempts[3].is_correct);
        assert_eq!(session.total_duration, 6_500);
        assert_eq!(session.total_duration_seconds, 7);

        // The wrong answer does not restart the widget timer
        assert_eq!(session.attempts[0].duration, 2_000);
        assert_eq!(session.attempts[1].duration, 3_000);
        assert_eq!(session.attempts[2].duration, 1_000);

        // Completion callback fired twice
        assert_eq!(flow.record(true, at(6_510)).unwrap(), ChapcaStep::Finished(None));

        flow.save_succeeded();
        assert_eq!(flow.status(), FlowStatus::Completed);
        assert_eq!(flow.record(true, at(7_000)).unwrap(), ChapcaStep::Finished(None));
    }

    #[test]
    fn test_failed_save_can_be_retried_once() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut s = settings(OrderMode::Sequential);
        s.selection = vec![Text];
        let mut flow = ChapcaFlow::new("a@mida.az", s, &mut rng).unwrap();
        flow.start(at(0)).unwrap();

        let ChapcaStep::Finished(Some(first)) = flow.record(true, at(1_000)).unwrap() else {
            panic!("expected a session");
        };
        flow.save_failed();
        assert_eq!(flow.status(), FlowStatus::Completing);
        assert_eq!(flow.record(true, at(1_100)).unwrap(), ChapcaStep::Finished(None));

        let again = flow.retry_save().unwrap();
        assert_eq!(again, first);
        assert!(flow.retry_save().is_none());
        flow.save_succeeded();
        assert_eq!(flow.status(), FlowStatus::Completed);
    }

    #[test]
    fn test_abandon_persists_partial_progress_only() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut flow = ChapcaFlow::new("a@mida.az", settings(OrderMode::Sequential), &mut rng).unwrap();
        flow.start(at(0)).unwrap();
        assert!(flow.abandon(at(500)).is_none());
        assert_eq!(flow.status(), FlowStatus::Abandoned);
        assert!(flow.record(true, at(600)).is_err());

        let mut flow = ChapcaFlow::new("a@mida.az", settings(OrderMode::Sequential), &mut rng).unwrap();
        flow.start(at(0)).unwrap();
        flow.record(true, at(1_000)).unwrap();
        let partial = flow.abandon(at(1_500)).unwrap();
        assert_eq!(partial.attempts.len(), 1);
        assert_eq!(partial.end_time, at(1_500));
        assert!(flow.abandon(at(1_600)).is_none());
    }

    #[test]
    fn test_abandoned_flow_with_failed_save_is_not_settled() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut flow = ChapcaFlow::new("a@mida.az", settings(OrderMode::Sequential), &mut rng).unwrap();
        flow.start(at(0)).unwrap();
        assert!(!flow.is_settled());
        flow.record(true, at(1_000)).unwrap();

        flow.abandon(at(1_500)).unwrap();
        assert!(!flow.is_settled());
        flow.save_failed();
        assert!(flow.abandon(at(1_600)).is_none());
        assert!(!flow.is_settled());

        let again = flow.retry_save().unwrap();
        assert_eq!(again.end_time, at(1_500));
        flow.save_succeeded();
        assert!(flow.is_settled());
    }

    #[test]
    fn test_start_twice_conflicts() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut flow = ChapcaFlow::new("a@mida.az", settings(OrderMode::Sequential), &mut rng).unwrap();
        flow.start(at(0)).unwrap();
        assert!(matches!(flow.start(at(1)), Err(MidaError::Conflict(_))));
    }
}
