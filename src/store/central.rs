//! Central store capability and the bounded, reachability-tracking handle
//! every caller goes through.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::attendance::{
    AuditEntry, CentralRecord, DailySummary, NewCentralRecord, WorkerId,
};
use crate::model::identity::WorkerProfile;

/// Operations the authoritative store must provide. Archived rows are
/// invisible to every lookup.
#[async_trait]
pub trait CentralStore: Send + Sync {
    async fn ping(&self) -> Result<()>;

    async fn find_record(&self, worker_id: WorkerId, date: NaiveDate) -> Result<Option<CentralRecord>>;

    /// Insert a row and return its id.
    async fn insert_record(&self, record: &NewCentralRecord) -> Result<i64>;

    /// Set the time-out on an open row. Returns false when no open,
    /// unarchived row with that id exists.
    async fn apply_time_out(&self, attendance_id: i64, time_out: NaiveTime, hours_worked: f64) -> Result<bool>;

    async fn append_audit(&self, entry: &AuditEntry) -> Result<()>;

    async fn list_workers(&self, project_id: Option<i64>) -> Result<Vec<WorkerProfile>>;

    async fn daily_summary(&self, date: NaiveDate, project_id: Option<i64>) -> Result<DailySummary>;
}

/// Shared connection handle: bounds every call with a timeout and tracks
/// whether the central store is currently reachable.
pub struct CentralHandle {
    store: Arc<dyn CentralStore>,
    timeout: Duration,
    online: AtomicBool,
}

impl CentralHandle {
    pub fn new(store: Arc<dyn CentralStore>, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            online: AtomicBool::new(false),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Check reachability with a round trip. Returns the new state.
    pub async fn probe(&self) -> bool {
        self.guard(self.store.ping()).await.is_ok()
    }

    pub async fn find_record(&self, worker_id: WorkerId, date: NaiveDate) -> Result<Option<CentralRecord>> {
        self.guard(self.store.find_record(worker_id, date)).await
    }

    pub async fn insert_record(&self, record: &NewCentralRecord) -> Result<i64> {
        self.guard(self.store.insert_record(record)).await
    }

    pub async fn apply_time_out(&self, attendance_id: i64, time_out: NaiveTime, hours_worked: f64) -> Result<bool> {
        self.guard(self.store.apply_time_out(attendance_id, time_out, hours_worked))
            .await
    }

    pub async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        self.guard(self.store.append_audit(entry)).await
    }

    pub async fn list_workers(&self, project_id: Option<i64>) -> Result<Vec<WorkerProfile>> {
        self.guard(self.store.list_workers(project_id)).await
    }

    pub async fn daily_summary(&self, date: NaiveDate, project_id: Option<i64>) -> Result<DailySummary> {
        self.guard(self.store.daily_summary(date, project_id)).await
    }

    async fn guard<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        };

        match &result {
            Ok(_) => self.set_online(true),
            Err(e) if e.is_connectivity() => {
                warn!(error = %e, "Central store call failed");
                self.set_online(false);
            }
            Err(_) => {}
        }
        result
    }

    fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            if online {
                info!("Central store reachable");
            } else {
                warn!("Central store unreachable, writes go to the local buffer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCentralStore;

    #[tokio::test]
    async fn probe_tracks_reachability() {
        let store = Arc::new(MemoryCentralStore::new());
        let handle = CentralHandle::new(store.clone(), Duration::from_secs(1));
        assert!(!handle.is_online());

        assert!(handle.probe().await);
        assert!(handle.is_online());

        store.set_online(false);
        assert!(!handle.probe().await);
        assert!(!handle.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_calls_time_out_and_mark_offline() {
        let store = Arc::new(MemoryCentralStore::new());
        let handle = CentralHandle::new(store.clone(), Duration::from_millis(200));
        assert!(handle.probe().await);

        store.set_latency(Duration::from_secs(10));
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let err = handle.find_record(7, date).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(!handle.is_online());
    }
}
