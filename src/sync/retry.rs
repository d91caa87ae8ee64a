use std::collections::HashMap;

use crate::model::attendance::BufferId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending { attempts: u32 },
    PermanentlyFailed { attempts: u32 },
}

/// Per buffer-record failure counts for the sync engine.
///
/// `Pending -> PermanentlyFailed` happens exactly once, when a failure
/// brings the count to the configured maximum. Exhausted records are
/// excluded from automatic passes until the process restarts.
#[derive(Debug)]
pub struct RetryLedger {
    max_attempts: u32,
    entries: HashMap<BufferId, RetryState>,
}

impl RetryLedger {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn state(&self, id: BufferId) -> RetryState {
        self.entries
            .get(&id)
            .copied()
            .unwrap_or(RetryState::Pending { attempts: 0 })
    }

    pub fn is_exhausted(&self, id: BufferId) -> bool {
        matches!(self.state(id), RetryState::PermanentlyFailed { .. })
    }

    /// Count a failed attempt and return the resulting state.
    pub fn record_failure(&mut self, id: BufferId) -> RetryState {
        let next = match self.state(id) {
            RetryState::Pending { attempts } if attempts + 1 >= self.max_attempts => {
                RetryState::PermanentlyFailed {
                    attempts: attempts + 1,
                }
            }
            RetryState::Pending { attempts } => RetryState::Pending {
                attempts: attempts + 1,
            },
            failed @ RetryState::PermanentlyFailed { .. } => failed,
        };
        self.entries.insert(id, next);
        next
    }

    pub fn clear(&mut self, id: BufferId) {
        self.entries.remove(&id);
    }

    pub fn exhausted(&self) -> Vec<BufferId> {
        let mut ids: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, state)| matches!(state, RetryState::PermanentlyFailed { .. }))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}
