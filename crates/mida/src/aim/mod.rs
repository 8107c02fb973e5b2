//! Reflex trainer: targets spawn at an accelerating rate and must be hit
//! (or dragged to the centre) before they expire. Three expirations end
//! the game.

mod target;
mod trainer;

pub use target::{Arena, DragOffset, Target};
pub use trainer::{
    AimTrainer, GameState, accuracy, spawn_interval_ms, target_lifetime_ms, target_size,
};
