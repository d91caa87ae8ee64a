//! Recognition debounce gate.
//!
//! Turns the identity source's high-rate stream into at most one confirmed
//! trigger per worker per continuous presence. Owned by the foreground path;
//! nothing here locks or blocks.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::GateConfig;
use crate::model::attendance::WorkerId;
use crate::model::identity::{ConfirmedTrigger, IdentityEvent};

/// Presence of the currently tracked worker.
#[derive(Debug, Clone, PartialEq)]
pub struct DebounceState {
    pub worker_id: WorkerId,
    pub first_seen_at: Instant,
    pub last_seen_at: Instant,
    pub triggered: bool,
}

impl DebounceState {
    fn new(worker_id: WorkerId, at: Instant) -> Self {
        Self {
            worker_id,
            first_seen_at: at,
            last_seen_at: at,
            triggered: false,
        }
    }

    pub fn dwell(&self) -> Duration {
        self.last_seen_at.saturating_duration_since(self.first_seen_at)
    }
}

/// What the gate is doing right now, for display surfaces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateStatus {
    Idle,
    Holding { worker_id: WorkerId, progress: f32 },
    Cooldown { worker_id: WorkerId, remaining: Duration },
    Triggered { worker_id: WorkerId },
}

pub struct DebounceGate {
    config: GateConfig,
    tracked: Option<DebounceState>,
    cooldowns: HashMap<WorkerId, Instant>,
}

impl DebounceGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            tracked: None,
            cooldowns: HashMap::new(),
        }
    }

    pub fn tracked(&self) -> Option<&DebounceState> {
        self.tracked.as_ref()
    }

    /// Feed one recognition. Returns a trigger at most once per dwell.
    pub fn observe(&mut self, event: IdentityEvent) -> Option<ConfirmedTrigger> {
        let now = event.at;
        self.expire(now);
        self.cooldowns.retain(|_, expires_at| now < *expires_at);

        let same_worker = self
            .tracked
            .as_ref()
            .is_some_and(|state| state.worker_id == event.worker_id);
        if !same_worker {
            debug!(worker_id = event.worker_id, "Tracking new worker");
            self.tracked = Some(DebounceState::new(event.worker_id, now));
        }
        let state = self.tracked.as_mut()?;
        state.last_seen_at = now;

        if state.triggered
            || self.cooldowns.contains_key(&state.worker_id)
            || state.dwell() < self.config.stability
        {
            return None;
        }

        state.triggered = true;
        self.cooldowns
            .insert(state.worker_id, now + self.config.cooldown);
        debug!(worker_id = state.worker_id, dwell = ?state.dwell(), "Presence confirmed");
        Some(ConfirmedTrigger {
            worker_id: state.worker_id,
        })
    }

    /// Drop the tracker once nothing has been seen for the grace period.
    pub fn expire(&mut self, now: Instant) {
        if let Some(state) = &self.tracked {
            if now.saturating_duration_since(state.last_seen_at) > self.config.loss_grace {
                debug!(worker_id = state.worker_id, "Worker left detection zone");
                self.tracked = None;
            }
        }
    }

    pub fn in_cooldown(&self, worker_id: WorkerId, now: Instant) -> bool {
        self.cooldowns
            .get(&worker_id)
            .is_some_and(|expires_at| now < *expires_at)
    }

    pub fn status(&self, now: Instant) -> GateStatus {
        let Some(state) = &self.tracked else {
            return GateStatus::Idle;
        };
        if state.triggered {
            return GateStatus::Triggered {
                worker_id: state.worker_id,
            };
        }
        if let Some(expires_at) = self.cooldowns.get(&state.worker_id) {
            if now < *expires_at {
                return GateStatus::Cooldown {
                    worker_id: state.worker_id,
                    remaining: *expires_at - now,
                };
            }
        }
        let progress = if self.config.stability.is_zero() {
            1.0
        } else {
            (state.dwell().as_secs_f32() / self.config.stability.as_secs_f32()).min(1.0)
        };
        GateStatus::Holding {
            worker_id: state.worker_id,
            progress,
        }
    }
}
