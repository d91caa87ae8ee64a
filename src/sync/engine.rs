//! Replays pending buffer rows into the central store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::model::attendance::{BufferId, BufferedRecord};
use crate::model::sync::{EVENT_SYNC_FAILED, SyncReport};
use crate::store::{CentralHandle, LocalBuffer};
use crate::sync::retry::{RetryLedger, RetryState};
use crate::sync::transport::SyncTransport;

pub const LAST_SYNC_KEY: &str = "last_sync_at";

/// Cached data that depends on central connectivity and is reloaded when
/// the central store comes back.
#[async_trait]
pub trait ReferenceData: Send + Sync {
    fn name(&self) -> &'static str;

    /// Reload from the central store, returning the number of entries.
    async fn refresh(&self, central: &CentralHandle) -> Result<usize>;
}

pub struct SyncEngine {
    buffer: LocalBuffer,
    central: Arc<CentralHandle>,
    transports: Vec<Box<dyn SyncTransport>>,
    ledger: Mutex<RetryLedger>,
    reference_data: Vec<Arc<dyn ReferenceData>>,
    was_online: AtomicBool,
    running: Arc<AtomicBool>,
    pass: tokio::sync::Mutex<()>,
}

impl SyncEngine {
    /// `transports` are tried in order; the first available one carries a
    /// whole pass.
    pub fn new(
        buffer: LocalBuffer,
        central: Arc<CentralHandle>,
        transports: Vec<Box<dyn SyncTransport>>,
        max_retry_attempts: u32,
    ) -> Self {
        let was_online = central.is_online();
        Self {
            buffer,
            central,
            transports,
            ledger: Mutex::new(RetryLedger::new(max_retry_attempts)),
            reference_data: Vec::new(),
            was_online: AtomicBool::new(was_online),
            running: Arc::new(AtomicBool::new(true)),
            pass: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_reference_data(mut self, data: Arc<dyn ReferenceData>) -> Self {
        self.reference_data.push(data);
        self
    }

    /// Flag checked between batches; clearing it ends the current pass
    /// after the batch in flight.
    pub fn running(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn buffer(&self) -> &LocalBuffer {
        &self.buffer
    }

    /// Buffer ids excluded from automatic passes.
    pub fn permanently_failed(&self) -> Vec<BufferId> {
        match self.ledger.lock() {
            Ok(ledger) => ledger.exhausted(),
            Err(poisoned) => poisoned.into_inner().exhausted(),
        }
    }

    /// Probe the central store and refresh reference data on an
    /// offline -> online transition. Returns true on that transition.
    ///
    /// An outage seen only by the foreground path counts too: the handle
    /// going offline since the last probe clears the previous state.
    pub async fn check_reconnect(&self) -> bool {
        let handle_online = self.central.is_online();
        let online = self.central.probe().await;
        let was_online = self.was_online.swap(online, Ordering::SeqCst) && handle_online;
        if !online || was_online {
            return false;
        }

        info!("Central store reconnected, refreshing reference data");
        for data in &self.reference_data {
            match data.refresh(&self.central).await {
                Ok(count) => info!(data = data.name(), count, "Reference data refreshed"),
                Err(e) => warn!(data = data.name(), error = %e, "Reference data refresh failed"),
            }
        }
        true
    }

    pub async fn sync_all(&self) -> SyncReport {
        let _pass = self.pass.lock().await;
        self.check_reconnect().await;

        let pending = match self.buffer.pending().await {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Could not read pending buffer rows");
                return SyncReport::default();
            }
        };
        if pending.is_empty() {
            return SyncReport::default();
        }

        let Some(transport) = self.select_transport().await else {
            debug!(pending = pending.len(), "No sync transport available");
            return SyncReport {
                pending: pending.len(),
                ..SyncReport::default()
            };
        };

        let mut report = SyncReport::default();
        let mut eligible = Vec::with_capacity(pending.len());
        for record in pending {
            if self.with_ledger(|ledger| ledger.is_exhausted(record.id)) {
                report.failed += 1;
            } else {
                eligible.push(record);
            }
        }

        info!(transport = transport.name(), records = eligible.len(), "Sync pass started");
        for batch in eligible.chunks(transport.batch_size().max(1)) {
            if !self.running.load(Ordering::SeqCst) {
                info!("Sync stopped between batches");
                break;
            }

            match transport.deliver(batch).await {
                Ok(accepted) => {
                    for record in batch {
                        if accepted.contains(&record.id) {
                            match self.buffer.mark_synced(record.id).await {
                                Ok(()) => {
                                    self.with_ledger(|ledger| ledger.clear(record.id));
                                    report.synced += 1;
                                }
                                // replay is idempotent, the next pass retries it
                                Err(e) => {
                                    error!(buffer_id = record.id, error = %e, "Could not mark record synced");
                                    report.failed += 1;
                                }
                            }
                        } else {
                            self.charge_failure(record, "not acknowledged").await;
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!(transport = transport.name(), error = %e, "Sync batch failed");
                    for record in batch {
                        self.charge_failure(record, &e.to_string()).await;
                        report.failed += 1;
                    }
                    if e.is_connectivity() {
                        break;
                    }
                }
            }
        }

        let stamp = Local::now().naive_local().format("%Y-%m-%d %H:%M:%S").to_string();
        if let Err(e) = self.buffer.set_device_config(LAST_SYNC_KEY, &stamp).await {
            warn!(error = %e, "Could not record last sync time");
        }

        report.pending = match self.buffer.pending_count().await {
            Ok(count) => usize::try_from(count).unwrap_or_default(),
            Err(_) => report.failed,
        };
        info!(
            synced = report.synced,
            failed = report.failed,
            pending = report.pending,
            "Sync pass finished"
        );
        report
    }

    async fn select_transport(&self) -> Option<&dyn SyncTransport> {
        for transport in &self.transports {
            if transport.is_available().await {
                return Some(transport.as_ref());
            }
        }
        None
    }

    async fn charge_failure(&self, record: &BufferedRecord, reason: &str) {
        let state = self.with_ledger(|ledger| ledger.record_failure(record.id));
        match state {
            RetryState::Pending { attempts } => {
                debug!(buffer_id = record.id, attempts, reason, "Sync attempt failed");
            }
            RetryState::PermanentlyFailed { attempts } => {
                error!(
                    buffer_id = record.id,
                    worker_id = record.worker_id,
                    attempts,
                    reason,
                    "Record permanently failed to sync"
                );
                let description = format!(
                    "buffer_id={} worker_id={} date={} attempts={} reason={}",
                    record.id, record.worker_id, record.attendance_date, attempts, reason
                );
                if let Err(e) = self.buffer.record_event(EVENT_SYNC_FAILED, &description).await {
                    warn!(error = %e, "Could not record sync failure event");
                }
            }
        }
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut RetryLedger) -> T) -> T {
        match self.ledger.lock() {
            Ok(mut ledger) => f(&mut ledger),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
