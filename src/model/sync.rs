use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::attendance::{BufferId, BufferedRecord, WorkerId};

/// Outcome counts of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    pub pending: usize,
}

/// Batched request accepted by the remote sync endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub action: String,
    pub api_key: String,
    pub device_name: String,
    pub project_id: Option<i64>,
    pub records: Vec<SyncRecordPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecordPayload {
    pub buffer_id: BufferId,
    pub worker_id: WorkerId,
    pub attendance_date: NaiveDate,
    pub time_in: Option<NaiveTime>,
    pub time_out: Option<NaiveTime>,
    pub status: String,
    pub hours_worked: f64,
}

impl From<&BufferedRecord> for SyncRecordPayload {
    fn from(record: &BufferedRecord) -> Self {
        Self {
            buffer_id: record.id,
            worker_id: record.worker_id,
            attendance_date: record.attendance_date,
            time_in: record.time_in,
            time_out: record.time_out,
            status: record.status.clone(),
            hours_worked: record.hours_worked,
        }
    }
}

/// Response of the remote sync endpoint. Only `synced_ids` are acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    #[serde(default)]
    pub synced_ids: Vec<BufferId>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Row of the local `system_events` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow, ToSchema)]
pub struct SystemEvent {
    pub id: i64,
    #[schema(example = "sync_failed")]
    pub event_type: String,
    pub description: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

pub const EVENT_SYNC_FAILED: &str = "sync_failed";
