mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{at, harness, time, worker, Harness};
use site_attendance::attendance::{AttendanceMachine, Outcome, Tier};
use site_attendance::config::{AttendanceConfig, GateConfig};
use site_attendance::directory::WorkerDirectory;
use site_attendance::gate::DebounceGate;
use site_attendance::kiosk::Kiosk;
use site_attendance::model::identity::IdentityEvent;
use site_attendance::store::DualStore;
use tokio::sync::{Notify, mpsc};

async fn kiosk(h: &Harness, min_confidence: f32) -> Kiosk {
    h.store.add_worker(None, worker(7, "Ana"));
    let directory = WorkerDirectory::new(None);
    directory.load(&h.central).await.unwrap();

    let machine = AttendanceMachine::new(
        DualStore::new(h.central.clone(), h.buffer.clone()),
        &AttendanceConfig::default(),
    );
    Kiosk::new(
        DebounceGate::new(GateConfig::default()),
        machine,
        directory,
        min_confidence,
    )
}

fn seen(worker_id: i64, confidence: f32, at: Instant) -> IdentityEvent {
    IdentityEvent {
        worker_id,
        confidence,
        at,
    }
}

#[tokio::test]
async fn steady_presence_times_the_worker_in_once() {
    let h = harness().await;
    let mut kiosk = kiosk(&h, 0.5).await;
    let start = Instant::now();

    let mut outcomes = Vec::new();
    for tick in 0..=50 {
        let event = seen(7, 0.9, start + Duration::from_millis(tick * 100));
        outcomes.extend(kiosk.handle_at(event, at(8, 0, 0)).await);
    }

    assert_eq!(
        outcomes,
        vec![Outcome::TimedIn {
            time: time(8, 0, 0),
            tier: Tier::Central
        }]
    );
    assert_eq!(h.store.rows().len(), 1);
}

#[tokio::test]
async fn low_confidence_recognitions_never_reach_the_gate() {
    let h = harness().await;
    let mut kiosk = kiosk(&h, 0.5).await;
    let start = Instant::now();

    for tick in 0..=50 {
        let event = seen(7, 0.3, start + Duration::from_millis(tick * 100));
        assert!(kiosk.handle_at(event, at(8, 0, 0)).await.is_none());
    }
    assert!(h.store.rows().is_empty());
}

#[tokio::test]
async fn last_event_carries_the_directory_label() {
    let h = harness().await;
    let mut kiosk = kiosk(&h, 0.0).await;
    let last = kiosk.subscribe();
    let start = Instant::now();

    for tick in 0..=30 {
        let event = seen(7, 0.9, start + Duration::from_millis(tick * 100));
        kiosk.handle_at(event, at(8, 0, 0)).await;
    }

    let event = last.borrow().clone().unwrap();
    assert_eq!(event.worker_id, 7);
    assert_eq!(event.label, "Ana Santos (WKR-0007)");
    assert!(matches!(event.outcome, Outcome::TimedIn { .. }));
}

#[tokio::test]
async fn run_loop_processes_queued_events_until_shutdown() {
    let h = harness().await;
    let kiosk = kiosk(&h, 0.0).await;
    let mut last = kiosk.subscribe();
    let (tx, rx) = mpsc::channel(64);
    let shutdown = Arc::new(Notify::new());
    let task = tokio::spawn(kiosk.run(rx, shutdown.clone()));

    let start = Instant::now();
    for tick in 0..=31 {
        tx.send(seen(7, 0.9, start + Duration::from_millis(tick * 100)))
            .await
            .unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), last.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.store.rows().len(), 1);

    shutdown.notify_one();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
}
