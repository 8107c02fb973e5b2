//! One-shot persistence guard.

use serde::Serialize;

/// Lifecycle of the single session write of a playthrough
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed,
}

/// `Idle -> Saving -> Saved | Failed`, with `Failed -> Saving` on retry.
///
/// The transition to `Saving` happens synchronously, before the caller
/// issues the asynchronous write, so a second completion signal arriving
/// while the write is in flight finds the guard closed.
#[derive(Debug, Clone, Default)]
pub struct SaveGuard {
    state: SaveState,
}

impl SaveGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    /// Claim the write. Only succeeds once, from `Idle`.
    pub fn begin(&mut self) -> bool {
        if self.state == SaveState::Idle {
            self.state = SaveState::Saving;
            true
        } else {
            false
        }
    }

    /// Claim the write again after a failure
    pub fn retry(&mut self) -> bool {
        if self.state == SaveState::Failed {
            self.state = SaveState::Saving;
            true
        } else {
            false
        }
    }

    pub fn succeed(&mut self) {
        if self.state == SaveState::Saving {
            self.state = SaveState::Saved;
        }
    }

    pub fn fail(&mut self) {
        if self.state == SaveState::Saving {
            self.state = SaveState::Failed;
        }
    }

    /// Back to `Idle` for a new playthrough
    pub fn reset(&mut self) {
        self.state = SaveState::Idle;
    }
}
