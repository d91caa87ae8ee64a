use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

pub type WorkerId = i64;
pub type BufferId = i64;

pub const STATUS_PRESENT: &str = "present";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
}

/// Where a day's record was read from, with that store's row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSource {
    Central(i64),
    Buffer(BufferId),
}

/// One worker's attendance for one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub source: RecordSource,
    pub worker_id: WorkerId,
    pub date: NaiveDate,
    pub time_in: NaiveTime,
    pub time_out: Option<NaiveTime>,
    pub hours_worked: Option<f64>,
    pub sync_status: SyncStatus,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.time_out.is_none()
    }
}

/// Row of the local `attendance_buffer` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct BufferedRecord {
    pub id: BufferId,
    pub worker_id: WorkerId,
    #[schema(value_type = String, format = "date")]
    pub attendance_date: NaiveDate,
    #[schema(value_type = Option<String>, example = "08:00:00")]
    pub time_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "16:30:00")]
    pub time_out: Option<NaiveTime>,
    pub status: String,
    pub hours_worked: f64,
    pub sync_status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub synced_at: Option<NaiveDateTime>,
}

impl BufferedRecord {
    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending.to_string()
    }

    /// View this row as the day's record. A row without a time-in cannot
    /// represent a valid attendance and is reported as inconsistent.
    pub fn to_record(&self) -> Option<AttendanceRecord> {
        let time_in = self.time_in?;
        Some(AttendanceRecord {
            source: RecordSource::Buffer(self.id),
            worker_id: self.worker_id,
            date: self.attendance_date,
            time_in,
            time_out: self.time_out,
            hours_worked: self.time_out.map(|_| self.hours_worked),
            sync_status: if self.is_pending() {
                SyncStatus::Pending
            } else {
                SyncStatus::Synced
            },
        })
    }
}

/// Row of the central `attendance` table, archived rows excluded.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CentralRecord {
    pub attendance_id: i64,
    pub worker_id: WorkerId,
    pub attendance_date: NaiveDate,
    pub time_in: Option<NaiveTime>,
    pub time_out: Option<NaiveTime>,
}

impl CentralRecord {
    pub fn to_record(&self) -> Option<AttendanceRecord> {
        let time_in = self.time_in?;
        Some(AttendanceRecord {
            source: RecordSource::Central(self.attendance_id),
            worker_id: self.worker_id,
            date: self.attendance_date,
            time_in,
            time_out: self.time_out,
            hours_worked: None,
            sync_status: SyncStatus::Synced,
        })
    }
}

/// Full field set for inserting a central row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCentralRecord {
    pub worker_id: WorkerId,
    pub attendance_date: NaiveDate,
    pub time_in: NaiveTime,
    pub time_out: Option<NaiveTime>,
    pub status: String,
    pub hours_worked: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    TimeIn,
    TimeOut,
}

/// Append-only audit entry written after a successful central write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub worker_id: WorkerId,
    pub attendance_id: i64,
    pub action: AuditAction,
    pub timestamp: NaiveDateTime,
    pub hours_worked: Option<f64>,
}

/// Present / completed counts for one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DailySummary {
    pub present: i64,
    pub completed: i64,
}

/// Drop sub-second precision; stores keep `HH:MM:SS`.
pub fn clock_time(now: NaiveDateTime) -> NaiveTime {
    now.time().with_nanosecond(0).unwrap_or_else(|| now.time())
}

/// Hours between two same-day clock times, rounded to two decimals.
pub fn hours_between(time_in: NaiveTime, time_out: NaiveTime) -> f64 {
    let seconds = (time_out - time_in).num_seconds().max(0) as f64;
    (seconds / 36.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn hours_are_rounded_to_two_decimals() {
        assert_eq!(hours_between(t(8, 0, 0), t(8, 31, 0)), 0.52);
        assert_eq!(hours_between(t(8, 0, 0), t(16, 30, 0)), 8.5);
        assert_eq!(hours_between(t(8, 0, 0), t(8, 0, 0)), 0.0);
    }

    #[test]
    fn hours_never_go_negative() {
        assert_eq!(hours_between(t(9, 0, 0), t(8, 0, 0)), 0.0);
    }

    #[test]
    fn sync_status_round_trips_through_its_column_text() {
        assert_eq!(SyncStatus::Pending.to_string(), "pending");
        assert_eq!("synced".parse::<SyncStatus>().unwrap(), SyncStatus::Synced);
    }

    #[test]
    fn buffered_row_without_time_in_is_not_a_record() {
        let row = BufferedRecord {
            id: 1,
            worker_id: 7,
            attendance_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            time_in: None,
            time_out: None,
            status: STATUS_PRESENT.into(),
            hours_worked: 0.0,
            sync_status: "pending".into(),
            created_at: NaiveDate::from_ymd_opt(2026, 3, 2)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            synced_at: None,
        };
        assert!(row.to_record().is_none());
    }
}
