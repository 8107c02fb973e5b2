//! Live chapca flows keyed by id.
//!
//! Flows that see no activity for `max_idle` are evicted, so a tab closed
//! mid-flow does not pin memory. A flow whose write is in flight is kept.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use super::{ChapcaFlow, SaveState};

struct Entry {
    flow: ChapcaFlow,
    last_active: DateTime<Utc>,
}

pub struct FlowRegistry {
    flows: HashMap<String, Entry>,
    max_idle: Duration,
}

impl FlowRegistry {
    pub fn new(max_idle: Duration) -> Self {
        Self {
            flows: HashMap::new(),
            max_idle,
        }
    }

    /// Add a flow, sweeping idle ones first. Returns how many were evicted.
    pub fn insert(&mut self, id: String, flow: ChapcaFlow, now: DateTime<Utc>) -> usize {
        let evicted = self.evict_idle(now);
        self.flows.insert(
            id,
            Entry {
                flow,
                last_active: now,
            },
        );
        evicted
    }

    pub fn get(&self, id: &str) -> Option<&ChapcaFlow> {
        self.flows.get(id).map(|entry| &entry.flow)
    }

    /// Mutable access; counts as activity
    pub fn get_mut(&mut self, id: &str, now: DateTime<Utc>) -> Option<&mut ChapcaFlow> {
        self.flows.get_mut(id).map(|entry| {
            entry.last_active = now;
            &mut entry.flow
        })
    }

    pub fn remove(&mut self, id: &str) -> Option<ChapcaFlow> {
        self.flows.remove(id).map(|entry| entry.flow)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Drop flows idle for at least `max_idle`
    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.flows.len();
        let max_idle = self.max_idle;
        self.flows.retain(|id, entry| {
            if now - entry.last_active < max_idle {
                return true;
            }
            match entry.flow.save_state() {
                SaveState::Saving => true,
                SaveState::Failed => {
                    tracing::warn!(flow_id = %id, email = %entry.flow.email(), "Evicting idle flow with an unsaved session");
                    false
                }
                SaveState::Idle | SaveState::Saved => {
                    tracing::debug!(flow_id = %id, "Evicting idle flow");
                    false
                }
            }
        });
        before - self.flows.len()
    }
}
