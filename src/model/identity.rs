use std::time::Instant;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::WorkerId;

/// A single recognition reported by the identity source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdentityEvent {
    pub worker_id: WorkerId,
    pub confidence: f32,
    pub at: Instant,
}

/// Debounced single-shot signal that a worker is stably present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedTrigger {
    pub worker_id: WorkerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct WorkerProfile {
    #[schema(example = 7)]
    pub worker_id: WorkerId,
    #[schema(example = "Juan")]
    pub first_name: String,
    #[schema(example = "Dela Cruz")]
    pub last_name: String,
    #[schema(example = "WKR-0007")]
    pub worker_code: String,
}

impl WorkerProfile {
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.first_name, self.last_name, self.worker_code)
    }
}
