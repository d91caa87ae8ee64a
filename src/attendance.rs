//! Attendance state machine.
//!
//! No record today      -> time-in
//! Open record          -> time-out, once the minimum work interval passed
//! Open record, early   -> too soon, nothing written
//! Closed record        -> already completed, nothing written

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::{error, info};

use crate::config::AttendanceConfig;
use crate::model::attendance::{WorkerId, clock_time, hours_between};
use crate::store::{AttendanceWrite, DualStore, PersistResult};

/// Store tier that accepted a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Central,
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Outcome {
    TimedIn {
        time: NaiveTime,
        tier: Tier,
    },
    TimedOut {
        time: NaiveTime,
        hours_worked: f64,
        tier: Tier,
    },
    TooSoon {
        minutes_elapsed: i64,
        minutes_required: i64,
    },
    AlreadyCompleted,
    StoreError {
        reason: String,
    },
}

pub struct AttendanceMachine {
    store: DualStore,
    min_work_interval_minutes: i64,
}

impl AttendanceMachine {
    pub fn new(store: DualStore, config: &AttendanceConfig) -> Self {
        Self {
            store,
            min_work_interval_minutes: config.min_work_interval_minutes,
        }
    }

    pub fn store(&self) -> &DualStore {
        &self.store
    }

    /// Decide and persist the attendance event for a confirmed trigger.
    /// Store failures are returned as `StoreError` and not retried here;
    /// the worker's next confirmed trigger retries naturally.
    pub async fn process(&self, worker_id: WorkerId, now: NaiveDateTime) -> Outcome {
        let today = now.date();
        let at = today.and_time(clock_time(now));

        let existing = match self.store.today_record(worker_id, today).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(error = %e, worker_id, "Could not read today's attendance");
                return Outcome::StoreError {
                    reason: e.to_string(),
                };
            }
        };

        let write = match existing {
            None => AttendanceWrite::TimeIn { worker_id, at },
            Some(record) if record.is_open() => {
                let elapsed = at - today.and_time(record.time_in);
                if elapsed.num_seconds() < self.min_work_interval_minutes * 60 {
                    info!(
                        worker_id,
                        minutes_elapsed = elapsed.num_minutes(),
                        "Time-out refused, minimum work interval not met"
                    );
                    return Outcome::TooSoon {
                        minutes_elapsed: elapsed.num_minutes().max(0),
                        minutes_required: self.min_work_interval_minutes,
                    };
                }
                let hours_worked = hours_between(record.time_in, at.time());
                AttendanceWrite::TimeOut {
                    record,
                    at,
                    hours_worked,
                }
            }
            Some(_) => return Outcome::AlreadyCompleted,
        };

        let tier = match self.store.commit(&write).await {
            PersistResult::CommittedCentral { .. } => Tier::Central,
            PersistResult::CommittedLocal { .. } => Tier::Local,
            PersistResult::Failed(e) => {
                return Outcome::StoreError {
                    reason: e.to_string(),
                };
            }
        };

        match write {
            AttendanceWrite::TimeIn { at, .. } => {
                info!(worker_id, time = %at.time(), ?tier, "TIME IN");
                Outcome::TimedIn {
                    time: at.time(),
                    tier,
                }
            }
            AttendanceWrite::TimeOut {
                at, hours_worked, ..
            } => {
                info!(worker_id, time = %at.time(), hours_worked, ?tier, "TIME OUT");
                Outcome::TimedOut {
                    time: at.time(),
                    hours_worked,
                    tier,
                }
            }
        }
    }
}
