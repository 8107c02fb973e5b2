//! The aim trainer game loop.

use chrono::{DateTime, Utc};
use mida_common::constants::aim::{
    DROP_ZONE_RADIUS_PX, LIFETIME_MIN_MS, LIFETIME_START_MS, LIFETIME_STEP_MS, MAX_EXPIRED,
    POINTS_PER_LEVEL, SIZE_MIN_PX, SIZE_START_PX, SIZE_STEP_PX, SPAWN_INTERVAL_END_MS,
    SPAWN_INTERVAL_START_MS, SPAWN_RAMP_SECS,
};
use mida_common::{AimSession, GameMode};
use rand::Rng;
use serde::Serialize;

use super::target::{Arena, DragOffset, FRAME_MS, Target};
use crate::flow::{SaveGuard, SaveState};

/// Spawn interval after `elapsed_secs` of play: 500ms ramping linearly
/// down to 100ms over the first 30 seconds
pub fn spawn_interval_ms(elapsed_secs: f64) -> i64 {
    if elapsed_secs >= SPAWN_RAMP_SECS {
        return SPAWN_INTERVAL_END_MS;
    }
    let progress = elapsed_secs.max(0.0) / SPAWN_RAMP_SECS;
    let span = (SPAWN_INTERVAL_START_MS - SPAWN_INTERVAL_END_MS) as f64;
    let interval = (SPAWN_INTERVAL_START_MS as f64 - span * progress).round() as i64;
    interval.max(SPAWN_INTERVAL_END_MS)
}

/// Lifetime of targets spawned at `level`
pub fn target_lifetime_ms(level: u32) -> i64 {
    let steps = level.saturating_sub(1) as i64;
    (LIFETIME_START_MS - LIFETIME_STEP_MS * steps).max(LIFETIME_MIN_MS)
}

/// Size of targets spawned at `level`
pub fn target_size(level: u32) -> f64 {
    let steps = level.saturating_sub(1) as f64;
    (SIZE_START_PX - SIZE_STEP_PX * steps).max(SIZE_MIN_PX)
}

/// Hit percentage rounded to one decimal; 100 before any event
pub fn accuracy(score: u32, misses: u32) -> f64 {
    let total = score + misses;
    if total == 0 {
        return 100.0;
    }
    (score as f64 / total as f64 * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameState {
    Idle,
    Running,
    /// Ended by expirations
    GameOver,
    /// Ended by the player
    Stopped,
}

/// A single aim trainer play session
#[derive(Debug, Clone)]
pub struct AimTrainer {
    email: String,
    mode: GameMode,
    arena: Arena,
    state: GameState,
    targets: Vec<Target>,
    next_id: u64,
    score: u32,
    misses: u32,
    expired: u32,
    level: u32,
    accuracy: f64,
    started_at: Option<DateTime<Utc>>,
    last_spawn_at: Option<DateTime<Utc>>,
    last_tick_at: Option<DateTime<Utc>>,
    dragging: Option<u64>,
    guard: SaveGuard,
    pending: Option<AimSession>,
}

impl AimTrainer {
    pub fn new(email: impl Into<String>, mode: GameMode, arena: Arena) -> Self {
        Self {
            email: email.into(),
            mode,
            arena,
            state: GameState::Idle,
            targets: Vec::new(),
            next_id: 0,
            score: 0,
            misses: 0,
            expired: 0,
            level: 1,
            accuracy: 100.0,
            started_at: None,
            last_spawn_at: None,
            last_tick_at: None,
            dragging: None,
            guard: SaveGuard::new(),
            pending: None,
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Switch mode between games
    pub fn set_mode(&mut self, mode: GameMode) -> bool {
        if self.state == GameState::Running {
            return false;
        }
        self.mode = mode;
        true
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn expired(&self) -> u32 {
        self.expired
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn save_state(&self) -> SaveState {
        self.guard.state()
    }

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.clear_counters();
        self.state = GameState::Running;
        self.started_at = Some(now);
        self.last_spawn_at = Some(now);
        self.last_tick_at = Some(now);
        self.guard.reset();
        self.pending = None;
        tracing::debug!(email = %self.email, mode = ?self.mode, "Aim game started");
    }

    /// Advance the game to `now`: move, expire, then spawn.
    ///
    /// Returns the session to persist when this tick ends the game.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> Option<AimSession> {
        if self.state != GameState::Running {
            return None;
        }
        let started_at = self.started_at?;

        if self.mode == GameMode::MovingTargets {
            let since = self.last_tick_at.unwrap_or(now);
            let frames = (now - since).num_milliseconds().max(0) as f64 / FRAME_MS;
            for target in &mut self.targets {
                target.advance(&self.arena, frames);
            }
        }
        self.last_tick_at = Some(now);

        let before = self.targets.len();
        self.targets.retain(|t| !t.is_expired(now));
        let newly_expired = (before - self.targets.len()) as u32;
        if newly_expired > 0 {
            self.expired += newly_expired;
            if self
                .dragging
                .is_some_and(|id| !self.targets.iter().any(|t| t.id == id))
            {
                self.dragging = None;
            }
            if self.expired >= MAX_EXPIRED {
                return self.game_over(now);
            }
        }

        let elapsed_secs = (now - started_at).num_milliseconds() as f64 / 1000.0;
        let interval = spawn_interval_ms(elapsed_secs);
        let last_spawn = self.last_spawn_at.unwrap_or(started_at);
        if (now - last_spawn).num_milliseconds() >= interval {
            self.spawn(now, rng);
            self.last_spawn_at = Some(now);
        }
        None
    }

    fn spawn<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) {
        let size = target_size(self.level);
        let lifetime_ms = target_lifetime_ms(self.level);
        for _ in 0..self.mode.spawn_count() {
            let (x, y) = self.arena.random_position(size, rng);
            let velocity = (self.mode == GameMode::MovingTargets).then(|| {
                (
                    (rng.random::<f64>() - 0.5) * 2.0,
                    (rng.random::<f64>() - 0.5) * 2.0,
                )
            });
            self.targets.push(Target {
                id: self.next_id,
                x,
                y,
                size,
                created_at: now,
                lifetime_ms,
                velocity,
                drag: None,
            });
            self.next_id += 1;
        }
    }

    fn score_point(&mut self) {
        self.score += 1;
        if self.score % POINTS_PER_LEVEL == 0 {
            self.level += 1;
        }
        self.accuracy = accuracy(self.score, self.misses);
    }

    /// Click on a target (not in drag mode)
    pub fn hit(&mut self, target_id: u64) -> bool {
        if self.state != GameState::Running || self.mode == GameMode::DragDrop {
            return false;
        }
        let Some(pos) = self.targets.iter().position(|t| t.id == target_id) else {
            return false;
        };
        self.targets.remove(pos);
        self.score_point();
        true
    }

    /// Click on the empty arena (not in drag mode)
    pub fn miss(&mut self) -> bool {
        if self.state != GameState::Running || self.mode == GameMode::DragDrop {
            return false;
        }
        self.misses += 1;
        self.accuracy = accuracy(self.score, self.misses);
        true
    }

    /// Grab a target at arena coordinates `(px, py)`
    pub fn pointer_down(&mut self, target_id: u64, px: f64, py: f64) -> bool {
        if self.state != GameState::Running || self.mode != GameMode::DragDrop {
            return false;
        }
        let Some(target) = self.targets.iter_mut().find(|t| t.id == target_id) else {
            return false;
        };
        target.drag = Some(DragOffset {
            dx: px - target.x,
            dy: py - target.y,
        });
        self.dragging = Some(target_id);
        true
    }

    pub fn pointer_move(&mut self, px: f64, py: f64) {
        let Some(id) = self.dragging else {
            return;
        };
        let arena = self.arena;
        let Some(target) = self.targets.iter_mut().find(|t| t.id == id) else {
            return;
        };
        if let Some(offset) = target.drag {
            (target.x, target.y) = arena.clamp(target.size, px - offset.dx, py - offset.dy);
        }
    }

    /// Release the dragged target; scores when dropped near the centre
    pub fn pointer_up(&mut self) -> bool {
        let Some(id) = self.dragging.take() else {
            return false;
        };
        let Some(pos) = self.targets.iter().position(|t| t.id == id) else {
            return false;
        };

        if self.state == GameState::Running
            && self.targets[pos].distance_to(self.arena.center()) < DROP_ZONE_RADIUS_PX
        {
            self.targets.remove(pos);
            self.score_point();
            true
        } else {
            self.targets[pos].drag = None;
            false
        }
    }

    /// End the game by hand. Games shorter than a second are discarded.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<AimSession> {
        if self.state != GameState::Running {
            return None;
        }
        self.state = GameState::Stopped;
        self.targets.clear();
        self.dragging = None;

        let started_at = self.started_at?;
        if (now - started_at).num_milliseconds() < 1000 {
            tracing::debug!(email = %self.email, "Aim game stopped before a full second, not saved");
            return None;
        }
        self.claim_write(now)
    }

    /// Stop and clear the scoreboard
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<AimSession> {
        let session = self.stop(now);
        self.clear_counters();
        self.state = GameState::Idle;
        session
    }

    pub fn save_succeeded(&mut self) {
        self.guard.succeed();
        self.pending = None;
    }

    pub fn save_failed(&mut self) {
        self.guard.fail();
    }

    pub fn retry_save(&mut self) -> Option<AimSession> {
        if self.guard.retry() {
            self.pending.clone()
        } else {
            None
        }
    }

    fn game_over(&mut self, now: DateTime<Utc>) -> Option<AimSession> {
        self.state = GameState::GameOver;
        self.targets.clear();
        self.dragging = None;
        tracing::debug!(email = %self.email, score = self.score, "Aim game over");
        self.claim_write(now)
    }

    fn claim_write(&mut self, now: DateTime<Utc>) -> Option<AimSession> {
        let started_at = self.started_at?;
        if !self.guard.begin() {
            return None;
        }
        let total = (now - started_at).num_milliseconds();
        let session = AimSession {
            email: self.email.clone(),
            start_time: started_at,
            end_time: now,
            total_duration: total,
            total_duration_seconds: mida_common::rounded_seconds(total),
            game_mode: self.mode,
            score: self.score,
            misses: self.misses,
            expired_targets: self.expired,
            accuracy: self.accuracy,
            level: self.level,
            created_at: now,
        };
        self.pending = Some(session.clone());
        Some(session)
    }

    fn clear_counters(&mut self) {
        self.targets.clear();
        self.next_id = 0;
        self.score = 0;
        self.misses = 0;
        self.expired = 0;
        self.level = 1;
        self.accuracy = 100.0;
        self.dragging = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(ms)
    }

    fn running(mode: GameMode) -> AimTrainer {
        let mut game = AimTrainer::new("a@mida.az", mode, Arena::default());
        game.start(at(0));
        game
    }

    #[test]
    fn test_difficulty_curves() {
        assert_eq!(spawn_interval_ms(0.0), 500);
        assert_eq!(spawn_interval_ms(15.0), 300);
        assert_eq!(spawn_interval_ms(29.99), 100);
        assert_eq!(spawn_interval_ms(30.0), 100);
        assert_eq!(spawn_interval_ms(120.0), 100);

        assert_eq!(target_lifetime_ms(1), 4000);
        assert_eq!(target_lifetime_ms(5), 3400);
        assert_eq!(target_lifetime_ms(14), 2050);
        assert_eq!(target_lifetime_ms(15), 2000);
        assert_eq!(target_lifetime_ms(40), 2000);

        assert_eq!(target_size(1), 80.0);
        assert_eq!(target_size(14), 41.0);
        assert_eq!(target_size(15), 40.0);
    }

    #[test]
    fn test_mode_changes_only_between_games() {
        let mut game = running(GameMode::Normal);
        assert!(!game.set_mode(GameMode::DualTargets));
        assert_eq!(game.mode(), GameMode::Normal);

        game.stop(at(5_000));
        assert!(game.set_mode(GameMode::DualTargets));
        assert_eq!(game.mode(), GameMode::DualTargets);
    }

    #[test]
    fn test_three_expirations_end_the_game_once() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = running(GameMode::Normal);

        let mut sessions = Vec::new();
        for ms in (500..=8_000).step_by(500) {
            if let Some(session) = game.tick(at(ms), &mut rng) {
                sessions.push(session);
            }
        }

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].expired_targets, 3);
        assert_eq!(sessions[0].end_time, at(5_500));
        assert_eq!(sessions[0].total_duration_seconds, 6);
        assert_eq!(game.state(), GameState::GameOver);
        assert!(game.targets().is_empty());
        assert_eq!(game.save_state(), SaveState::Saving);

        // Frozen: no spawns, no second session
        assert!(game.tick(at(9_000), &mut rng).is_none());
        assert!(game.targets().is_empty());
        assert!(game.stop(at(9_500)).is_none());
    }

    #[test]
    fn test_accuracy_after_hit_and_miss() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut game = running(GameMode::Normal);
        game.tick(at(500), &mut rng);
        let id = game.targets()[0].id;

        assert!(game.hit(id));
        assert_eq!(game.accuracy(), 100.0);
        assert!(game.miss());
        assert_eq!(game.accuracy(), 50.0);
        assert!(!game.hit(id));

        assert_eq!(accuracy(2, 1), 66.7);
        assert_eq!(accuracy(0, 0), 100.0);
    }

    #[test]
    fn test_level_up_every_ten_points() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = running(GameMode::DualTargets);
        let mut ms = 0;
        while game.score() < 10 {
            ms += 500;
            game.tick(at(ms), &mut rng);
            let ids: Vec<u64> = game.targets().iter().map(|t| t.id).collect();
            assert_eq!(ids.len(), 2);
            for id in ids {
                game.hit(id);
            }
        }
        assert_eq!(game.level(), 2);

        game.tick(at(ms + 500), &mut rng);
        assert!(game.targets().iter().all(|t| t.size == 77.0 && t.lifetime_ms == 3850));
    }

    #[test]
    fn test_spawn_rate_follows_elapsed_time() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut game = running(GameMode::Normal);
        game.tick(at(31_000), &mut rng);
        assert_eq!(game.targets().len(), 1);
        assert!(game.tick(at(31_050), &mut rng).is_none());
        assert_eq!(game.targets().len(), 1);
        game.tick(at(31_100), &mut rng);
        assert_eq!(game.targets().len(), 2);
    }

    #[test]
    fn test_short_manual_stop_is_discarded() {
        let mut game = running(GameMode::Normal);
        assert!(game.stop(at(900)).is_none());
        assert_eq!(game.state(), GameState::Stopped);
        assert_eq!(game.save_state(), SaveState::Idle);

        let mut game = running(GameMode::Normal);
        game.miss();
        let session = game.stop(at(2_400)).unwrap();
        assert_eq!(session.misses, 1);
        assert_eq!(session.accuracy, 0.0);
        assert_eq!(session.total_duration, 2_400);
        assert!(game.stop(at(2_500)).is_none());
    }

    #[test]
    fn test_failed_save_retry() {
        let mut game = running(GameMode::Normal);
        let session = game.stop(at(5_000)).unwrap();
        game.save_failed();
        assert_eq!(game.retry_save(), Some(session));
        game.save_succeeded();
        assert_eq!(game.save_state(), SaveState::Saved);

        // A new game starts with a fresh guard
        game.start(at(10_000));
        assert_eq!(game.save_state(), SaveState::Idle);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn test_drag_to_centre_scores() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = running(GameMode::DragDrop);
        game.tick(at(500), &mut rng);
        let target = game.targets()[0].clone();

        // Clicks do nothing in drag mode
        assert!(!game.hit(target.id));
        assert!(!game.miss());

        let grab = (target.x + 5.0, target.y + 5.0);
        assert!(game.pointer_down(target.id, grab.0, grab.1));
        // Drop with the centre 100px right of the arena centre: outside
        let off_x = 400.0 + 100.0 - target.size / 2.0 + 5.0;
        let off_y = 300.0 - target.size / 2.0 + 5.0;
        game.pointer_move(off_x, off_y);
        assert!(!game.pointer_up());
        assert_eq!(game.score(), 0);

        assert!(game.pointer_down(target.id, off_x, off_y));
        game.pointer_move(off_x - 60.0, off_y);
        assert!(game.pointer_up());
        assert_eq!(game.score(), 1);
        assert!(game.targets().is_empty());
    }

    #[test]
    fn test_drag_is_clamped_to_arena() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut game = running(GameMode::DragDrop);
        game.tick(at(500), &mut rng);
        let id = game.targets()[0].id;
        let (x, y) = (game.targets()[0].x, game.targets()[0].y);

        game.pointer_down(id, x, y);
        game.pointer_move(-500.0, 5_000.0);
        assert_eq!(game.targets()[0].x, 0.0);
        assert_eq!(game.targets()[0].y, 520.0);
    }

    #[test]
    fn test_moving_targets_move() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut game = running(GameMode::MovingTargets);
        game.tick(at(500), &mut rng);
        let before = game.targets()[0].clone();
        assert!(before.velocity.is_some());

        game.tick(at(550), &mut rng);
        let after = &game.targets()[0];
        assert!(after.x != before.x || after.y != before.y);
    }
}
