#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use site_attendance::attendance::AttendanceMachine;
use site_attendance::config::AttendanceConfig;
use site_attendance::db::init_memory_buffer;
use site_attendance::model::identity::WorkerProfile;
use site_attendance::store::memory::MemoryCentralStore;
use site_attendance::store::{CentralHandle, DualStore, LocalBuffer};

pub struct Harness {
    pub store: Arc<MemoryCentralStore>,
    pub central: Arc<CentralHandle>,
    pub buffer: LocalBuffer,
    pub machine: AttendanceMachine,
}

/// In-process central store plus an in-memory buffer. The handle has
/// already probed, so it starts online.
pub async fn harness() -> Harness {
    harness_with_timeout(Duration::from_secs(1)).await
}

pub async fn harness_with_timeout(store_timeout: Duration) -> Harness {
    let store = Arc::new(MemoryCentralStore::new());
    let central = Arc::new(CentralHandle::new(store.clone(), store_timeout));
    assert!(central.probe().await);

    let buffer = LocalBuffer::new(init_memory_buffer().await.unwrap())
        .await
        .unwrap();
    let machine = AttendanceMachine::new(
        DualStore::new(central.clone(), buffer.clone()),
        &AttendanceConfig::default(),
    );

    Harness {
        store,
        central,
        buffer,
        machine,
    }
}

impl Harness {
    /// Take the central store down and let the handle notice.
    pub async fn go_offline(&self) {
        self.store.set_online(false);
        assert!(!self.central.probe().await);
    }

    pub fn come_back(&self) {
        self.store.set_online(true);
    }
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn time(h: u32, m: u32, s: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, s).unwrap()
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_time(time(h, m, s))
}

pub fn worker(worker_id: i64, first_name: &str) -> WorkerProfile {
    WorkerProfile {
        worker_id,
        first_name: first_name.to_string(),
        last_name: "Santos".to_string(),
        worker_code: format!("WKR-{worker_id:04}"),
    }
}
