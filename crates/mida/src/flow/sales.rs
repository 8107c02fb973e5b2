//! Simulated two-step housing-sale wizard with planned captchas.
//!
//! Step 1 is the application form, step 2 the apartment search. Each step
//! gets its share of the captcha plan and is blocked until those captchas
//! are solved. Timers (auto-advance, regeneration) are deadlines checked by
//! [`SalesWizard::tick`].

use chrono::{DateTime, Duration, Utc};
use mida_common::constants::{
    DEFAULT_BIRTH_DATE, MAX_SALES_CAPTCHAS, SALES_ADVANCE_DELAY_MS, SALES_RETRY_DELAY_MS,
};
use mida_common::{CaptchaKind, Placement, PlanEntry, SalesSession};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::guard::{SaveGuard, SaveState};
use crate::captcha::{Outcome, date_literal, normalize_expected};

/// Housing projects offered in step 1
pub const PROJECTS: [&str; 11] = [
    "Yasamal Yaşayış Kompleksi",
    "Hövsan Yaşayış Kompleksi",
    "Sumqayıt şəhərində güzəştli mənzillər",
    "Gəncə Yaşayış Kompleksi",
    "Yasamal Yaşayış Kompleksinin ikinci mərhələsi",
    "Hövsan Yaşayış Kompleksinin ikinci mərhələsi",
    "Lənkəran Yaşayış Kompleksi",
    "Sumqayıt Yaşayış Kompleksi",
    "Binəqədi Yaşayış Kompleksi",
    "Şirvan Yaşayış Kompleksi",
    "Yevlax Yaşayış Kompleksi",
];

/// Probability that a planned captcha is shown in the modal
const MODAL_PROBABILITY: f64 = 0.6;

/// Global captcha settings for the wizard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesSettings {
    pub enabled: bool,
    pub allowed_kinds: Vec<CaptchaKind>,
    pub required_count: u32,
    /// Expected date for the date widget; today when unset
    pub today_date: Option<String>,
    pub birth_date: String,
}

impl Default for SalesSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_kinds: CaptchaKind::ALL.to_vec(),
            required_count: 1,
            today_date: None,
            birth_date: DEFAULT_BIRTH_DATE.to_string(),
        }
    }
}

impl SalesSettings {
    /// Planned captcha count, clamped to 1..=5
    pub fn required(&self) -> usize {
        self.required_count.clamp(1, MAX_SALES_CAPTCHAS) as usize
    }

    /// Expected literal for a keypad date widget
    pub fn expected_for(&self, kind: CaptchaKind, now: DateTime<Utc>) -> Option<String> {
        match kind {
            CaptchaKind::Date => Some(match &self.today_date {
                Some(date) => normalize_expected(date),
                None => date_literal(now.date_naive()),
            }),
            CaptchaKind::Birthdate => Some(normalize_expected(&self.birth_date)),
            CaptchaKind::Text | CaptchaKind::Number => None,
        }
    }
}

fn pick_kind<R: Rng + ?Sized>(
    allowed: &[CaptchaKind],
    exclude: Option<CaptchaKind>,
    rng: &mut R,
) -> CaptchaKind {
    if allowed.is_empty() {
        return CaptchaKind::Text;
    }
    let filtered: Vec<CaptchaKind> = allowed
        .iter()
        .copied()
        .filter(|k| Some(*k) != exclude)
        .collect();
    let pool = if filtered.is_empty() { allowed } else { &filtered[..] };
    pool[rng.random_range(0..pool.len())]
}

/// Split the required captchas across the two wizard steps
pub fn generate_plan<R: Rng + ?Sized>(settings: &SalesSettings, rng: &mut R) -> Vec<PlanEntry> {
    if !settings.enabled {
        return Vec::new();
    }

    let total = settings.required();
    let step1 = match total {
        0..=2 => 1,
        _ => rng.random_range(1..total),
    };

    let mut plan = Vec::with_capacity(total);
    let mut last = None;
    for i in 0..total {
        let kind = pick_kind(&settings.allowed_kinds, last, rng);
        last = Some(kind);
        let placement = if rng.random_bool(MODAL_PROBABILITY) {
            Placement::Modal
        } else {
            Placement::Sidebar
        };
        plan.push(PlanEntry {
            kind,
            step: if i < step1 { 1 } else { 2 },
            placement,
        });
    }
    plan
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Own,
    Mortgage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMethod {
    Map,
    Parameters,
    Address,
}

/// Step-1 form fields that failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormField {
    Project,
    Payment,
    Selection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SalesForm {
    pub project: Option<String>,
    pub payment: Option<PaymentMethod>,
    pub selection: Option<SelectionMethod>,
    /// Room counts to search for; 4 stands for "4 and more"
    pub rooms: Vec<u8>,
}

impl SalesForm {
    /// Only mortgage purchases searched by parameters are simulated
    pub fn invalid_fields(&self) -> Vec<FormField> {
        let mut invalid = Vec::new();
        if self.project.as_deref().is_none_or(str::is_empty) {
            invalid.push(FormField::Project);
        }
        if self.payment != Some(PaymentMethod::Mortgage) {
            invalid.push(FormField::Payment);
        }
        if self.selection != Some(SelectionMethod::Parameters) {
            invalid.push(FormField::Selection);
        }
        invalid
    }
}

/// One simulated search hit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Apartment {
    pub building: u32,
    pub entrance: u32,
    pub floor: String,
    pub apartment: u32,
    pub rooms: u8,
    /// Square metres, one decimal
    pub area: f64,
    pub price: u32,
}

/// Simulated apartment listing: 10 to 29 entries matching the room filter
pub fn simulate_search<R: Rng + ?Sized>(rooms: &[u8], rng: &mut R) -> Vec<Apartment> {
    let count = rng.random_range(10..30);
    (0..count)
        .map(|_| {
            let room_count = if rooms.is_empty() {
                rng.random_range(1..=3)
            } else {
                rooms[rng.random_range(0..rooms.len())]
            };
            let area = 45.0 + rng.random::<f64>() * 40.0;
            Apartment {
                building: rng.random_range(1..=20),
                entrance: rng.random_range(1..=5),
                floor: format!("{}/9", rng.random_range(1..=9)),
                apartment: rng.random_range(1..=100),
                rooms: room_count,
                area: (area * 10.0).round() / 10.0,
                price: 45_000 + room_count as u32 * 15_000 + rng.random_range(0..5_000),
            }
        })
        .collect()
}

/// Why a wizard action did not go through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "reason")]
pub enum Blocked {
    /// Step-1 form is incomplete
    Form { fields: Vec<FormField> },
    /// The current step still has an unsolved captcha, shown at `placement`
    Captcha { placement: Placement },
    /// Action not available in the current step
    WrongStep { step: u8 },
    /// No search results to pick from
    NoResults,
}

/// One sales wizard playthrough
#[derive(Debug, Clone)]
pub struct SalesWizard {
    email: String,
    settings: SalesSettings,
    plan: Vec<PlanEntry>,
    /// Solved captchas, also the index of the current one
    progress: usize,
    verified: bool,
    modal_open: bool,
    step: u8,
    started_at: DateTime<Utc>,
    step_started_at: DateTime<Utc>,
    step1_duration: f64,
    step2_duration: f64,
    captcha_duration: f64,
    correct: u32,
    incorrect: u32,
    captcha_started_at: Option<DateTime<Utc>>,
    advance_at: Option<DateTime<Utc>>,
    regenerate_at: Option<DateTime<Utc>>,
    widget_generation: u32,
    form: SalesForm,
    results: Vec<Apartment>,
    guard: SaveGuard,
    pending: Option<SalesSession>,
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

impl SalesWizard {
    pub fn new<R: Rng + ?Sized>(
        email: impl Into<String>,
        settings: SalesSettings,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Self {
        let plan = generate_plan(&settings, rng);
        Self::with_plan(email, settings, plan, now)
    }

    pub fn with_plan(
        email: impl Into<String>,
        settings: SalesSettings,
        plan: Vec<PlanEntry>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut wizard = Self {
            email: email.into(),
            settings,
            plan,
            progress: 0,
            verified: false,
            modal_open: false,
            step: 1,
            started_at: now,
            step_started_at: now,
            step1_duration: 0.0,
            step2_duration: 0.0,
            captcha_duration: 0.0,
            correct: 0,
            incorrect: 0,
            captcha_started_at: None,
            advance_at: None,
            regenerate_at: None,
            widget_generation: 0,
            form: SalesForm::default(),
            results: Vec::new(),
            guard: SaveGuard::new(),
            pending: None,
        };
        wizard.refresh_visibility(now);
        wizard
    }

    pub fn plan(&self) -> &[PlanEntry] {
        &self.plan
    }

    /// 1 (form), 2 (search) or 3 (done)
    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn form(&self) -> &SalesForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SalesForm {
        &mut self.form
    }

    pub fn results(&self) -> &[Apartment] {
        &self.results
    }

    pub fn is_modal_open(&self) -> bool {
        self.modal_open
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Changes whenever the current widget must be rebuilt
    pub fn widget_generation(&self) -> u32 {
        self.widget_generation
    }

    pub fn tallies(&self) -> (u32, u32) {
        (self.correct, self.incorrect)
    }

    /// Seconds spent on solved captchas
    pub fn captcha_duration(&self) -> f64 {
        self.captcha_duration
    }

    pub fn save_state(&self) -> SaveState {
        self.guard.state()
    }

    pub fn settings(&self) -> &SalesSettings {
        &self.settings
    }

    /// The next unsolved captcha, if it belongs to the current step
    pub fn current_captcha(&self) -> Option<PlanEntry> {
        self.plan
            .get(self.progress)
            .copied()
            .filter(|entry| entry.step == self.step)
    }

    /// Every captcha planned for the current step is solved
    pub fn step_solved(&self) -> bool {
        let planned = self.plan.iter().filter(|e| e.step == self.step).count();
        let solved = self.plan[..self.progress.min(self.plan.len())]
            .iter()
            .filter(|e| e.step == self.step)
            .count();
        solved >= planned
    }

    pub fn toggle_room(&mut self, room: u8) {
        if let Some(pos) = self.form.rooms.iter().position(|r| *r == room) {
            self.form.rooms.remove(pos);
        } else {
            self.form.rooms.push(room);
        }
    }

    pub fn open_modal(&mut self, now: DateTime<Utc>) {
        self.modal_open = true;
        self.refresh_visibility(now);
    }

    pub fn close_modal(&mut self, now: DateTime<Utc>) {
        self.modal_open = false;
        self.refresh_visibility(now);
    }

    /// Gate for captcha-protected actions; opens the modal when the pending
    /// captcha lives there.
    fn check_captchas(&mut self, now: DateTime<Utc>) -> Result<(), Blocked> {
        if self.step_solved() {
            return Ok(());
        }
        let placement = self
            .current_captcha()
            .map(|entry| entry.placement)
            .unwrap_or(Placement::Sidebar);
        if placement == Placement::Modal {
            self.open_modal(now);
        }
        Err(Blocked::Captcha { placement })
    }

    /// Leave step 1 for the search step
    pub fn next_step(&mut self, now: DateTime<Utc>) -> Result<(), Blocked> {
        if self.step != 1 {
            return Err(Blocked::WrongStep { step: self.step });
        }
        let fields = self.form.invalid_fields();
        if !fields.is_empty() {
            return Err(Blocked::Form { fields });
        }
        self.check_captchas(now)?;

        self.step1_duration = seconds_between(self.step_started_at, now);
        self.step = 2;
        self.step_started_at = now;
        self.refresh_visibility(now);
        tracing::debug!(email = %self.email, step1 = self.step1_duration, "Sales wizard at step 2");
        Ok(())
    }

    /// Run the simulated apartment search
    pub fn search<R: Rng + ?Sized>(
        &mut self,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<&[Apartment], Blocked> {
        if self.step != 2 {
            return Err(Blocked::WrongStep { step: self.step });
        }
        self.check_captchas(now)?;
        self.results = simulate_search(&self.form.rooms, rng);
        Ok(&self.results)
    }

    /// Outcome of the current captcha widget
    pub fn verify(&mut self, outcome: Outcome, now: DateTime<Utc>) -> bool {
        if self.verified || self.current_captcha().is_none() {
            return false;
        }

        match outcome {
            Outcome::Correct => {
                self.correct += 1;
                if let Some(started) = self.captcha_started_at {
                    self.captcha_duration += seconds_between(started, now);
                }
                self.verified = true;
                self.advance_at = Some(now + Duration::milliseconds(SALES_ADVANCE_DELAY_MS));
            }
            Outcome::Incorrect => {
                self.incorrect += 1;
                self.regenerate_at = Some(now + Duration::milliseconds(SALES_RETRY_DELAY_MS));
            }
        }
        true
    }

    /// Fire due timers. Returns whether anything changed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        if self.advance_at.is_some_and(|at| now >= at) {
            self.advance_at = None;
            self.progress += 1;
            self.verified = false;
            self.captcha_started_at = None;
            self.widget_generation += 1;

            let keep_open = self
                .plan
                .get(self.progress)
                .is_some_and(|next| next.step == self.step && next.placement == Placement::Modal);
            if !keep_open {
                self.modal_open = false;
            }
            changed = true;
        }

        if self.regenerate_at.is_some_and(|at| now >= at) {
            self.regenerate_at = None;
            self.widget_generation += 1;
            changed = true;
        }

        self.refresh_visibility(now);
        changed
    }

    /// Pick a search result, ending the simulation
    pub fn select_result(&mut self, now: DateTime<Utc>) -> Result<Option<SalesSession>, Blocked> {
        match self.step {
            2 if self.results.is_empty() => return Err(Blocked::NoResults),
            2 => {}
            3 => return Ok(None),
            step => return Err(Blocked::WrongStep { step }),
        }

        self.step2_duration = seconds_between(self.step_started_at, now);
        self.step = 3;
        self.modal_open = false;
        self.captcha_started_at = None;

        if !self.guard.begin() {
            return Ok(None);
        }
        let total = (now - self.started_at).num_milliseconds();
        let session = SalesSession {
            email: self.email.clone(),
            start_time: self.started_at,
            end_time: now,
            total_duration: total,
            total_duration_seconds: mida_common::rounded_seconds(total),
            step1_duration: self.step1_duration,
            step2_duration: self.step2_duration,
            captcha_duration: self.captcha_duration,
            correct_captchas: self.correct,
            incorrect_captchas: self.incorrect,
            project: self.form.project.clone().unwrap_or_default(),
            created_at: now,
        };
        self.pending = Some(session.clone());
        Ok(Some(session))
    }

    pub fn save_succeeded(&mut self) {
        self.guard.succeed();
        self.pending = None;
    }

    pub fn save_failed(&mut self) {
        self.guard.fail();
    }

    pub fn retry_save(&mut self) -> Option<SalesSession> {
        if self.guard.retry() {
            self.pending.clone()
        } else {
            None
        }
    }

    /// Captcha time runs while the current captcha is on screen: always for
    /// the sidebar, only while open for the modal.
    fn refresh_visibility(&mut self, now: DateTime<Utc>) {
        let visible = self.current_captcha().is_some_and(|entry| {
            entry.placement == Placement::Sidebar || self.modal_open
        });
        if self.verified {
            return;
        }
        if visible {
            self.captcha_started_at.get_or_insert(now);
        } else {
            self.captcha_started_at = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    fn settings(required_count: u32) -> SalesSettings {
        SalesSettings {
            required_count,
            ..SalesSettings::default()
        }
    }

    fn entry(kind: CaptchaKind, step: u8, placement: Placement) -> PlanEntry {
        PlanEntry {
            kind,
            step,
            placement,
        }
    }

    fn fill_form(wizard: &mut SalesWizard) {
        let form = wizard.form_mut();
        form.project = Some(PROJECTS[0].to_string());
        form.payment = Some(PaymentMethod::Mortgage);
        form.selection = Some(SelectionMethod::Parameters);
    }

    #[test]
    fn test_single_captcha_goes_to_step_one() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = generate_plan(&settings(1), &mut rng);
            assert_eq!(plan.len(), 1);
            assert_eq!(plan[0].step, 1);
        }
    }

    #[test]
    fn test_both_steps_populated_from_two() {
        for required in 2..=MAX_SALES_CAPTCHAS {
            for seed in 0..30 {
                let mut rng = StdRng::seed_from_u64(seed);
                let plan = generate_plan(&settings(required), &mut rng);
                assert_eq!(plan.len(), required as usize);
                assert!(plan.iter().any(|e| e.step == 1));
                assert!(plan.iter().any(|e| e.step == 2));
                // Step 1 entries come first
                assert!(plan.windows(2).all(|w| w[0].step <= w[1].step));
            }
        }
    }

    #[test]
    fn test_no_immediate_repeats() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = generate_plan(&settings(5), &mut rng);
            assert!(plan.windows(2).all(|w| w[0].kind != w[1].kind));
        }
    }

    #[test]
    fn test_required_count_is_clamped() {
        let mut rng = StdRng::seed_from_u64(10);
        assert_eq!(generate_plan(&settings(4_000_000_000), &mut rng).len(), 5);
        assert_eq!(generate_plan(&settings(0), &mut rng).len(), 1);
    }

    #[test]
    fn test_kind_fallbacks() {
        let mut rng = StdRng::seed_from_u64(8);
        let single = SalesSettings {
            allowed_kinds: vec![CaptchaKind::Number],
            ..settings(3)
        };
        assert!(generate_plan(&single, &mut rng).iter().all(|e| e.kind == CaptchaKind::Number));

        let none = SalesSettings {
            allowed_kinds: vec![],
            ..settings(2)
        };
        assert!(generate_plan(&none, &mut rng).iter().all(|e| e.kind == CaptchaKind::Text));

        let disabled = SalesSettings {
            enabled: false,
            ..settings(3)
        };
        assert!(generate_plan(&disabled, &mut rng).is_empty());
    }

    #[test]
    fn test_modal_bias() {
        let mut rng = StdRng::seed_from_u64(9);
        let plan: Vec<PlanEntry> = (0..400)
            .flat_map(|_| generate_plan(&settings(5), &mut rng))
            .collect();
        let modals = plan.iter().filter(|e| e.placement == Placement::Modal).count();
        let share = modals as f64 / plan.len() as f64;
        assert!((0.55..0.65).contains(&share), "modal share {}", share);
    }

    #[test]
    fn test_form_validation_comes_first() {
        let plan = vec![entry(CaptchaKind::Text, 1, Placement::Sidebar)];
        let mut wizard = SalesWizard::with_plan("a@mida.az", settings(1), plan, at(0));

        let Err(Blocked::Form { fields }) = wizard.next_step(at(100)) else {
            panic!("expected form errors");
        };
        assert_eq!(fields, vec![FormField::Project, FormField::Payment, FormField::Selection]);

        fill_form(&mut wizard);
        wizard.form_mut().payment = Some(PaymentMethod::Own);
        assert_eq!(
            wizard.next_step(at(100)),
            Err(Blocked::Form { fields: vec![FormField::Payment] })
        );
    }

    #[test]
    fn test_gating_opens_modal() {
        let plan = vec![
            entry(CaptchaKind::Date, 1, Placement::Modal),
            entry(CaptchaKind::Text, 1, Placement::Modal),
            entry(CaptchaKind::Number, 2, Placement::Sidebar),
        ];
        let mut wizard = SalesWizard::with_plan("a@mida.az", settings(3), plan, at(0));
        fill_form(&mut wizard);

        assert_eq!(
            wizard.next_step(at(1_000)),
            Err(Blocked::Captcha { placement: Placement::Modal })
        );
        assert!(wizard.is_modal_open());

        // Solved after 2s on screen
        assert!(wizard.verify(Outcome::Correct, at(3_000)));
        assert!(!wizard.verify(Outcome::Correct, at(3_100)));
        assert!(!wizard.tick(at(3_900)));
        assert!(wizard.tick(at(4_000)));
        // The next captcha is a modal of the same step, so it stays open
        assert!(wizard.is_modal_open());
        assert_eq!(wizard.current_captcha().map(|e| e.kind), Some(CaptchaKind::Text));

        wizard.verify(Outcome::Correct, at(5_000));
        wizard.tick(at(6_000));
        assert!(!wizard.is_modal_open());
        assert!((wizard.captcha_duration() - 3.0).abs() < 1e-9);

        assert_eq!(wizard.next_step(at(7_000)), Ok(()));
        assert_eq!(wizard.step(), 2);
        let mut rng = StdRng::seed_from_u64(10);
        assert_eq!(
            wizard.search(at(7_500), &mut rng).map(|r| r.len()),
            Err(Blocked::Captcha { placement: Placement::Sidebar })
        );
    }

    #[test]
    fn test_wrong_answer_regenerates_widget() {
        let plan = vec![entry(CaptchaKind::Number, 1, Placement::Sidebar)];
        let mut wizard = SalesWizard::with_plan("a@mida.az", settings(1), plan, at(0));
        let generation = wizard.widget_generation();

        assert!(wizard.verify(Outcome::Incorrect, at(1_000)));
        assert!(!wizard.tick(at(1_400)));
        assert!(wizard.tick(at(1_500)));
        assert_eq!(wizard.widget_generation(), generation + 1);
        assert_eq!(wizard.tallies(), (0, 1));
        assert!(!wizard.step_solved());
    }

    #[test]
    fn test_full_run_persists_once() {
        let plan = vec![
            entry(CaptchaKind::Text, 1, Placement::Sidebar),
            entry(CaptchaKind::Date, 2, Placement::Sidebar),
        ];
        let mut rng = StdRng::seed_from_u64(11);
        let mut wizard = SalesWizard::with_plan("a@mida.az", settings(2), plan, at(0));
        fill_form(&mut wizard);
        wizard.toggle_room(2);

        wizard.verify(Outcome::Incorrect, at(1_000));
        wizard.tick(at(1_500));
        wizard.verify(Outcome::Correct, at(2_000));
        wizard.tick(at(3_000));
        wizard.next_step(at(4_000)).unwrap();

        // Step-2 sidebar captcha becomes visible on entering the step
        wizard.verify(Outcome::Correct, at(5_500));
        wizard.tick(at(6_500));
        assert_eq!(wizard.select_result(at(6_600)), Err(Blocked::NoResults));

        let results = wizard.search(at(7_000), &mut rng).unwrap();
        assert!((10..30).contains(&results.len()));
        assert!(results.iter().all(|a| a.rooms == 2));

        let session = wizard.select_result(at(10_000)).unwrap().unwrap();
        assert_eq!(session.step1_duration, 4.0);
        assert_eq!(session.step2_duration, 6.0);
        assert!((session.captcha_duration - 3.5).abs() < 1e-9);
        assert_eq!(session.correct_captchas, 2);
        assert_eq!(session.incorrect_captchas, 1);
        assert_eq!(session.total_duration, 10_000);
        assert_eq!(session.project, PROJECTS[0]);

        assert_eq!(wizard.select_result(at(10_100)), Ok(None));
        wizard.save_failed();
        assert_eq!(wizard.retry_save(), Some(session));
        wizard.save_succeeded();
        assert_eq!(wizard.save_state(), SaveState::Saved);
    }

    #[test]
    fn test_expected_dates() {
        let s = SalesSettings {
            today_date: Some("01.02.2026".to_string()),
            ..SalesSettings::default()
        };
        assert_eq!(s.expected_for(CaptchaKind::Date, at(0)).as_deref(), Some("01/02/2026"));
        assert_eq!(
            SalesSettings::default().expected_for(CaptchaKind::Date, at(0)).as_deref(),
            Some("01/01/1970")
        );
        assert_eq!(
            s.expected_for(CaptchaKind::Birthdate, at(0)).as_deref(),
            Some("25/08/1990")
        );
    }
}
