//! Targets and the arena they live in.

use chrono::{DateTime, Utc};
use mida_common::constants::aim::SPAWN_PADDING_PX;
use rand::Rng;
use serde::Serialize;

/// Milliseconds per movement frame; velocities are pixels per frame
pub const FRAME_MS: f64 = 50.0;

/// Play area in pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
}

impl Arena {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Clamp a target's top-left corner so it stays inside
    pub fn clamp(&self, size: f64, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(0.0, (self.width - size).max(0.0)),
            y.clamp(0.0, (self.height - size).max(0.0)),
        )
    }

    /// Random top-left corner, away from the edges
    pub fn random_position<R: Rng + ?Sized>(&self, size: f64, rng: &mut R) -> (f64, f64) {
        let span_x = (self.width - size - SPAWN_PADDING_PX * 2.0).max(0.0);
        let span_y = (self.height - size - SPAWN_PADDING_PX * 2.0).max(0.0);
        (
            rng.random::<f64>() * span_x + SPAWN_PADDING_PX,
            rng.random::<f64>() * span_y + SPAWN_PADDING_PX,
        )
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

/// Pointer offset from the target's corner while dragged
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DragOffset {
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub created_at: DateTime<Utc>,
    pub lifetime_ms: i64,
    /// Moving-targets mode only
    pub velocity: Option<(f64, f64)>,
    pub drag: Option<DragOffset>,
}

impl Target {
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.size / 2.0, self.y + self.size / 2.0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.created_at).num_milliseconds() >= self.lifetime_ms
    }

    /// Advance by `frames` movement frames, bouncing off the arena walls
    pub fn advance(&mut self, arena: &Arena, frames: f64) {
        let Some((vx, vy)) = self.velocity else {
            return;
        };
        if self.drag.is_some() {
            return;
        }

        let max_x = (arena.width - self.size).max(0.0);
        let max_y = (arena.height - self.size).max(0.0);
        let (mut vx, mut vy) = (vx, vy);

        self.x += vx * frames;
        if self.x <= 0.0 || self.x >= max_x {
            self.x = self.x.clamp(0.0, max_x);
            vx = -vx;
        }
        self.y += vy * frames;
        if self.y <= 0.0 || self.y >= max_y {
            self.y = self.y.clamp(0.0, max_y);
            vy = -vy;
        }
        self.velocity = Some((vx, vy));
    }

    /// Distance from the target centre to a point
    pub fn distance_to(&self, point: (f64, f64)) -> f64 {
        let (cx, cy) = self.center();
        ((cx - point.0).powi(2) + (cy - point.1).powi(2)).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(x: f64, y: f64, velocity: Option<(f64, f64)>) -> Target {
        Target {
            id: 0,
            x,
            y,
            size: 80.0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            lifetime_ms: 4000,
            velocity,
            drag: None,
        }
    }

    #[test]
    fn test_bounces_off_right_wall() {
        let arena = Arena::default();
        let mut t = target(719.5, 100.0, Some((1.0, 0.5)));
        t.advance(&arena, 1.0);
        assert_eq!(t.x, 720.0);
        assert_eq!(t.velocity, Some((-1.0, 0.5)));
        t.advance(&arena, 2.0);
        assert_eq!(t.x, 718.0);
        assert_eq!(t.y, 101.5);
    }

    #[test]
    fn test_static_targets_do_not_move() {
        let arena = Arena::default();
        let mut t = target(10.0, 10.0, None);
        t.advance(&arena, 5.0);
        assert_eq!((t.x, t.y), (10.0, 10.0));
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let t = target(0.0, 0.0, None);
        let at = |ms| DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::milliseconds(ms);
        assert!(!t.is_expired(at(3_999)));
        assert!(t.is_expired(at(4_000)));
    }

    #[test]
    fn test_clamp_and_spawn_bounds() {
        let arena = Arena::new(300.0, 200.0);
        assert_eq!(arena.clamp(50.0, -10.0, 500.0), (0.0, 150.0));

        let mut rng = rand::rng();
        for _ in 0..100 {
            let (x, y) = arena.random_position(50.0, &mut rng);
            assert!((20.0..=230.0).contains(&x));
            assert!((20.0..=130.0).contains(&y));
        }
    }
}
