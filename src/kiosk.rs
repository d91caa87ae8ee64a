//! Foreground path: recognitions in, attendance outcomes out.
//!
//! A single task owns the gate and the state machine, so per-worker
//! debounce state never crosses a lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::{Notify, mpsc, watch};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::attendance::{AttendanceMachine, Outcome};
use crate::directory::WorkerDirectory;
use crate::gate::DebounceGate;
use crate::model::attendance::WorkerId;
use crate::model::identity::IdentityEvent;

const EXPIRE_TICK: Duration = Duration::from_millis(250);

/// Last attendance outcome, for the status endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LastEvent {
    pub worker_id: WorkerId,
    pub label: String,
    #[schema(value_type = String, format = "date-time")]
    pub at: NaiveDateTime,
    #[schema(value_type = Object, example = json!({"action": "timed_in", "time": "08:00:00", "tier": "central"}))]
    pub outcome: Outcome,
}

pub struct Kiosk {
    gate: DebounceGate,
    machine: AttendanceMachine,
    directory: WorkerDirectory,
    min_confidence: f32,
    last_event: watch::Sender<Option<LastEvent>>,
}

impl Kiosk {
    pub fn new(
        gate: DebounceGate,
        machine: AttendanceMachine,
        directory: WorkerDirectory,
        min_confidence: f32,
    ) -> Self {
        let (last_event, _) = watch::channel(None);
        Self {
            gate,
            machine,
            directory,
            min_confidence,
            last_event,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<LastEvent>> {
        self.last_event.subscribe()
    }

    pub async fn handle(&mut self, event: IdentityEvent) -> Option<Outcome> {
        self.handle_at(event, Local::now().naive_local()).await
    }

    /// Feed one recognition; `now` is the wall clock used if it triggers.
    pub async fn handle_at(&mut self, event: IdentityEvent, now: NaiveDateTime) -> Option<Outcome> {
        if event.confidence < self.min_confidence {
            debug!(
                worker_id = event.worker_id,
                confidence = event.confidence,
                "Recognition below confidence floor"
            );
            return None;
        }

        let trigger = self.gate.observe(event)?;
        let outcome = self.machine.process(trigger.worker_id, now).await;
        let label = self.directory.label(trigger.worker_id).await;

        match &outcome {
            Outcome::StoreError { reason } => {
                warn!(worker = %label, %reason, "Attendance not recorded")
            }
            other => info!(worker = %label, outcome = ?other, "Attendance processed"),
        }

        self.last_event.send_replace(Some(LastEvent {
            worker_id: trigger.worker_id,
            label,
            at: now,
            outcome: outcome.clone(),
        }));
        Some(outcome)
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<IdentityEvent>, shutdown: Arc<Notify>) {
        let mut tick = tokio::time::interval(EXPIRE_TICK);
        info!("Kiosk started");
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event).await;
                    }
                    None => break,
                },
                _ = tick.tick() => self.gate.expire(Instant::now()),
            }
        }
        info!("Kiosk stopped");
    }
}
