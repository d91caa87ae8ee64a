use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::sync::engine::SyncEngine;

const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Control side of the background sync task.
#[derive(Clone)]
pub struct SyncHandle {
    wake: Arc<Notify>,
    shutdown: Arc<Notify>,
    running: Arc<AtomicBool>,
}

impl SyncHandle {
    /// Run a pass now instead of waiting for the interval.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Stop after the batch in flight.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Spawn the sync loop: a pass every `interval`, on `wake()`, and whenever
/// the `probe_interval` check sees the central store come back.
pub fn spawn(
    engine: Arc<SyncEngine>,
    interval: Duration,
    probe_interval: Duration,
) -> (SyncHandle, JoinHandle<()>) {
    let handle = SyncHandle {
        wake: Arc::new(Notify::new()),
        shutdown: Arc::new(Notify::new()),
        running: engine.running(),
    };

    let task = tokio::spawn(run(engine, handle.clone(), interval, probe_interval));
    (handle, task)
}

async fn run(engine: Arc<SyncEngine>, handle: SyncHandle, interval: Duration, probe_interval: Duration) {
    // interval() panics on a zero period
    let interval = interval.max(MIN_PERIOD);
    let probe_interval = probe_interval.max(MIN_PERIOD);
    let mut sync_tick = time::interval(interval);
    sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut probe_tick = time::interval(probe_interval);
    probe_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first probe tick fires immediately; the sync tick covers startup
    probe_tick.tick().await;

    info!(?interval, ?probe_interval, "Sync worker started");
    while handle.is_running() {
        tokio::select! {
            _ = handle.shutdown.notified() => break,
            _ = sync_tick.tick() => {
                engine.sync_all().await;
            }
            _ = handle.wake.notified() => {
                engine.sync_all().await;
            }
            _ = probe_tick.tick() => {
                if engine.check_reconnect().await {
                    engine.sync_all().await;
                }
            }
        }
    }
    info!("Sync worker stopped");
}
