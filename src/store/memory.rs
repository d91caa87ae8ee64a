//! In-process central store.
//!
//! Mirrors the MySQL semantics (one row per worker/date, archived rows
//! hidden, guarded time-out update) and can be switched offline or slowed
//! down. Used by the test suite and for dry runs without a server.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::error::{Error, Result};
use crate::model::attendance::{
    AuditEntry, CentralRecord, DailySummary, NewCentralRecord, WorkerId,
};
use crate::model::identity::WorkerProfile;
use crate::store::central::CentralStore;

/// Full central row, including the fields lookups do not return.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub attendance_id: i64,
    pub worker_id: WorkerId,
    pub attendance_date: NaiveDate,
    pub time_in: NaiveTime,
    pub time_out: Option<NaiveTime>,
    pub status: String,
    pub hours_worked: f64,
    pub is_archived: bool,
}

#[derive(Default)]
struct Tables {
    rows: Vec<StoredRow>,
    audit: Vec<AuditEntry>,
    workers: Vec<(Option<i64>, WorkerProfile)>,
}

pub struct MemoryCentralStore {
    tables: Mutex<Tables>,
    online: AtomicBool,
    fail_audit: AtomicBool,
    reject_writes: AtomicBool,
    latency_ms: AtomicU64,
}

impl Default for MemoryCentralStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCentralStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            online: AtomicBool::new(true),
            fail_audit: AtomicBool::new(false),
            reject_writes: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_fail_audit(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Reachable, but every attendance write is refused.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn add_worker(&self, project_id: Option<i64>, worker: WorkerProfile) {
        self.lock().workers.push((project_id, worker));
    }

    pub fn rows(&self) -> Vec<StoredRow> {
        self.lock().rows.clone()
    }

    pub fn audit_log(&self) -> Vec<AuditEntry> {
        self.lock().audit.clone()
    }

    pub fn archive(&self, attendance_id: i64) {
        if let Some(row) = self
            .lock()
            .rows
            .iter_mut()
            .find(|r| r.attendance_id == attendance_id)
        {
            row.is_archived = true;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // a panicking test thread must not wedge the others
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn reach(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Unavailable("connection refused".into()))
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(Error::Inconsistent("attendance write rejected".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CentralStore for MemoryCentralStore {
    async fn ping(&self) -> Result<()> {
        self.reach().await
    }

    async fn find_record(&self, worker_id: WorkerId, date: NaiveDate) -> Result<Option<CentralRecord>> {
        self.reach().await?;
        Ok(self
            .lock()
            .rows
            .iter()
            .find(|r| !r.is_archived && r.worker_id == worker_id && r.attendance_date == date)
            .map(|r| CentralRecord {
                attendance_id: r.attendance_id,
                worker_id: r.worker_id,
                attendance_date: r.attendance_date,
                time_in: Some(r.time_in),
                time_out: r.time_out,
            }))
    }

    async fn insert_record(&self, record: &NewCentralRecord) -> Result<i64> {
        self.reach().await?;
        self.check_writable()?;
        let mut tables = self.lock();
        let duplicate = tables.rows.iter().any(|r| {
            !r.is_archived && r.worker_id == record.worker_id && r.attendance_date == record.attendance_date
        });
        if duplicate {
            return Err(Error::Inconsistent(format!(
                "duplicate attendance for worker {} on {}",
                record.worker_id, record.attendance_date
            )));
        }

        let attendance_id = tables.rows.len() as i64 + 1;
        tables.rows.push(StoredRow {
            attendance_id,
            worker_id: record.worker_id,
            attendance_date: record.attendance_date,
            time_in: record.time_in,
            time_out: record.time_out,
            status: record.status.clone(),
            hours_worked: record.hours_worked,
            is_archived: false,
        });
        Ok(attendance_id)
    }

    async fn apply_time_out(&self, attendance_id: i64, time_out: NaiveTime, hours_worked: f64) -> Result<bool> {
        self.reach().await?;
        self.check_writable()?;
        let mut tables = self.lock();
        match tables
            .rows
            .iter_mut()
            .find(|r| r.attendance_id == attendance_id && !r.is_archived && r.time_out.is_none())
        {
            Some(row) => {
                row.time_out = Some(time_out);
                row.hours_worked = hours_worked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.reach().await?;
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(Error::Inconsistent("audit_trail rejected the entry".into()));
        }
        self.lock().audit.push(entry.clone());
        Ok(())
    }

    async fn list_workers(&self, project_id: Option<i64>) -> Result<Vec<WorkerProfile>> {
        self.reach().await?;
        Ok(self
            .lock()
            .workers
            .iter()
            .filter(|(project, _)| project_id.is_none() || *project == project_id)
            .map(|(_, worker)| worker.clone())
            .collect())
    }

    async fn daily_summary(&self, date: NaiveDate, project_id: Option<i64>) -> Result<DailySummary> {
        self.reach().await?;
        let tables = self.lock();
        let assigned = |worker_id: WorkerId| {
            project_id.is_none()
                || tables
                    .workers
                    .iter()
                    .any(|(p, w)| *p == project_id && w.worker_id == worker_id)
        };

        let mut present = std::collections::HashSet::new();
        let mut completed = std::collections::HashSet::new();
        for row in tables
            .rows
            .iter()
            .filter(|r| !r.is_archived && r.attendance_date == date && assigned(r.worker_id))
        {
            present.insert(row.worker_id);
            if row.time_out.is_some() {
                completed.insert(row.worker_id);
            }
        }

        Ok(DailySummary {
            present: present.len() as i64,
            completed: completed.len() as i64,
        })
    }
}
