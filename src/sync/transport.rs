//! Sync transports: how buffered records reach the central store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::attendance::{BufferId, BufferedRecord, NewCentralRecord};
use crate::store::CentralHandle;

#[async_trait]
pub trait SyncTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Records handed over per `deliver` call. The engine checks its
    /// running flag between calls.
    fn batch_size(&self) -> usize;

    async fn is_available(&self) -> bool;

    /// Apply `records` and return the buffer ids the central side accepted.
    /// Ids not returned stay pending.
    async fn deliver(&self, records: &[BufferedRecord]) -> Result<Vec<BufferId>>;
}

/// What a direct replay did to the central row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Inserted,
    TimeOutApplied,
    AlreadyReconciled,
}

/// Direct connection to the central store, one record per call.
pub struct DirectTransport {
    central: Arc<CentralHandle>,
}

impl DirectTransport {
    pub fn new(central: Arc<CentralHandle>) -> Self {
        Self { central }
    }

    /// Idempotent upsert of one buffered record.
    pub async fn reconcile(&self, record: &BufferedRecord) -> Result<Reconciled> {
        let existing = self
            .central
            .find_record(record.worker_id, record.attendance_date)
            .await?;

        match existing {
            None => {
                let time_in = record.time_in.ok_or_else(|| {
                    Error::Inconsistent(format!("buffered attendance {} has no time-in", record.id))
                })?;
                self.central
                    .insert_record(&NewCentralRecord {
                        worker_id: record.worker_id,
                        attendance_date: record.attendance_date,
                        time_in,
                        time_out: record.time_out,
                        status: record.status.clone(),
                        hours_worked: record.hours_worked,
                    })
                    .await?;
                Ok(Reconciled::Inserted)
            }
            Some(central) => match record.time_out {
                Some(time_out) if central.time_out.is_none() => {
                    // guarded by time_out IS NULL, so a lost race is a no-op
                    self.central
                        .apply_time_out(central.attendance_id, time_out, record.hours_worked)
                        .await?;
                    Ok(Reconciled::TimeOutApplied)
                }
                _ => Ok(Reconciled::AlreadyReconciled),
            },
        }
    }
}

#[async_trait]
impl SyncTransport for DirectTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn batch_size(&self) -> usize {
        1
    }

    async fn is_available(&self) -> bool {
        self.central.is_online()
    }

    async fn deliver(&self, records: &[BufferedRecord]) -> Result<Vec<BufferId>> {
        let mut accepted = Vec::with_capacity(records.len());
        for record in records {
            let action = self.reconcile(record).await?;
            debug!(buffer_id = record.id, ?action, "Reconciled buffered record");
            accepted.push(record.id);
        }
        Ok(accepted)
    }
}
