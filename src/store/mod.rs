//! Two-tier persistence: central store first, local buffer as the fallback.

pub mod buffer;
pub mod central;
pub mod memory;
pub mod mysql;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::model::attendance::{
    AttendanceRecord, AuditAction, AuditEntry, BufferId, NewCentralRecord, RecordSource,
    STATUS_PRESENT, WorkerId,
};

pub use buffer::LocalBuffer;
pub use central::{CentralHandle, CentralStore};

/// A mutation decided by the attendance state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceWrite {
    TimeIn {
        worker_id: WorkerId,
        at: NaiveDateTime,
    },
    TimeOut {
        record: AttendanceRecord,
        at: NaiveDateTime,
        hours_worked: f64,
    },
}

/// Which tier took a write.
#[derive(Debug)]
pub enum PersistResult {
    CommittedCentral { attendance_id: i64 },
    CommittedLocal { buffer_id: BufferId },
    Failed(Error),
}

#[derive(Clone)]
pub struct DualStore {
    central: Arc<CentralHandle>,
    buffer: LocalBuffer,
}

impl DualStore {
    pub fn new(central: Arc<CentralHandle>, buffer: LocalBuffer) -> Self {
        Self { central, buffer }
    }

    pub fn central(&self) -> &Arc<CentralHandle> {
        &self.central
    }

    pub fn buffer(&self) -> &LocalBuffer {
        &self.buffer
    }

    /// The worker's record for `date`.
    ///
    /// Central first when reachable; a pending buffered record that is
    /// further along than the central row wins so an unsynced offline event
    /// is never shadowed. Offline, the latest buffered row of the day is used.
    pub async fn today_record(&self, worker_id: WorkerId, date: NaiveDate) -> Result<Option<AttendanceRecord>> {
        if self.central.is_online() {
            match self.central.find_record(worker_id, date).await {
                Ok(central) => {
                    let central = central
                        .map(|row| {
                            row.to_record().ok_or_else(|| {
                                Error::Inconsistent(format!(
                                    "central attendance {} has no time-in",
                                    row.attendance_id
                                ))
                            })
                        })
                        .transpose()?;
                    let pending = self.buffered_record(worker_id, date, true).await?;
                    return Ok(further_along(central, pending));
                }
                Err(e) => {
                    warn!(error = %e, worker_id, "Central lookup failed, reading local buffer");
                }
            }
        }

        self.buffered_record(worker_id, date, false).await
    }

    async fn buffered_record(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        pending_only: bool,
    ) -> Result<Option<AttendanceRecord>> {
        match self.buffer.latest_for_day(worker_id, date, pending_only).await? {
            Some(row) => row.to_record().map(Some).ok_or_else(|| {
                Error::Inconsistent(format!("buffered attendance {} has no time-in", row.id))
            }),
            None => Ok(None),
        }
    }

    /// Perform a write against the central store, falling back to the local
    /// buffer on any central error. Only a time-out with no open time-in
    /// fails outright.
    pub async fn commit(&self, write: &AttendanceWrite) -> PersistResult {
        match write {
            AttendanceWrite::TimeIn { worker_id, at } => self.commit_time_in(*worker_id, *at).await,
            AttendanceWrite::TimeOut {
                record,
                at,
                hours_worked,
            } => self.commit_time_out(record, *at, *hours_worked).await,
        }
    }

    async fn commit_time_in(&self, worker_id: WorkerId, at: NaiveDateTime) -> PersistResult {
        let date = at.date();
        let time_in = at.time();

        if self.central.is_online() {
            let record = NewCentralRecord {
                worker_id,
                attendance_date: date,
                time_in,
                time_out: None,
                status: STATUS_PRESENT.to_string(),
                hours_worked: 0.0,
            };
            match self.central.insert_record(&record).await {
                Ok(attendance_id) => {
                    self.audit(worker_id, attendance_id, AuditAction::TimeIn, at, None)
                        .await;
                    info!(worker_id, attendance_id, %time_in, "Time-in stored centrally");
                    return PersistResult::CommittedCentral { attendance_id };
                }
                Err(e) => {
                    warn!(error = %e, worker_id, "Central time-in failed, buffering locally");
                }
            }
        }

        match self.buffer.insert_time_in(worker_id, date, time_in).await {
            Ok(buffer_id) => PersistResult::CommittedLocal { buffer_id },
            Err(e) => {
                error!(error = %e, worker_id, "Buffering time-in failed");
                PersistResult::Failed(e)
            }
        }
    }

    async fn commit_time_out(
        &self,
        record: &AttendanceRecord,
        at: NaiveDateTime,
        hours_worked: f64,
    ) -> PersistResult {
        let worker_id = record.worker_id;
        let time_out = at.time();

        match record.source {
            RecordSource::Central(attendance_id) => {
                if self.central.is_online() {
                    match self
                        .central
                        .apply_time_out(attendance_id, time_out, hours_worked)
                        .await
                    {
                        Ok(true) => {
                            self.audit(
                                worker_id,
                                attendance_id,
                                AuditAction::TimeOut,
                                at,
                                Some(hours_worked),
                            )
                            .await;
                            info!(worker_id, attendance_id, %time_out, hours_worked, "Time-out stored centrally");
                            return PersistResult::CommittedCentral { attendance_id };
                        }
                        Ok(false) => {
                            error!(worker_id, attendance_id, "Time-out has no open central time-in");
                            return PersistResult::Failed(self.orphan(record));
                        }
                        Err(e) => {
                            warn!(error = %e, worker_id, "Central time-out failed, buffering locally");
                        }
                    }
                }
                self.buffer_time_out(record, time_out, hours_worked).await
            }
            RecordSource::Buffer(buffer_id) => match self.buffer.get(buffer_id).await {
                Ok(Some(row)) if row.time_in.is_some() && row.time_out.is_none() => {
                    self.buffer_time_out(record, time_out, hours_worked).await
                }
                Ok(_) => {
                    error!(worker_id, buffer_id, "Time-out has no open buffered time-in");
                    PersistResult::Failed(self.orphan(record))
                }
                Err(e) => PersistResult::Failed(e),
            },
        }
    }

    async fn buffer_time_out(
        &self,
        record: &AttendanceRecord,
        time_out: NaiveTime,
        hours_worked: f64,
    ) -> PersistResult {
        match self
            .buffer
            .record_time_out(record.worker_id, record.date, record.time_in, time_out, hours_worked)
            .await
        {
            Ok(buffer_id) => PersistResult::CommittedLocal { buffer_id },
            Err(e) => {
                error!(error = %e, worker_id = record.worker_id, "Buffering time-out failed");
                PersistResult::Failed(e)
            }
        }
    }

    fn orphan(&self, record: &AttendanceRecord) -> Error {
        Error::Orphan {
            worker_id: record.worker_id,
            date: record.date,
        }
    }

    /// Best effort; the attendance write stands whatever happens here.
    async fn audit(
        &self,
        worker_id: WorkerId,
        attendance_id: i64,
        action: AuditAction,
        timestamp: NaiveDateTime,
        hours_worked: Option<f64>,
    ) {
        let entry = AuditEntry {
            worker_id,
            attendance_id,
            action,
            timestamp,
            hours_worked,
        };
        if let Err(e) = self.central.append_audit(&entry).await {
            warn!(error = %e, worker_id, %action, "Audit append failed");
        }
    }
}

/// Pick the more advanced of the central row and a pending buffered row.
fn further_along(
    central: Option<AttendanceRecord>,
    pending: Option<AttendanceRecord>,
) -> Option<AttendanceRecord> {
    match (central, pending) {
        (None, pending) => pending,
        (Some(central), Some(pending)) if central.is_open() && !pending.is_open() => Some(pending),
        (central, _) => central,
    }
}
