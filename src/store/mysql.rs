use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::warn;

use crate::error::Result;
use crate::model::attendance::{
    AuditAction, AuditEntry, CentralRecord, DailySummary, NewCentralRecord, WorkerId,
};
use crate::model::identity::WorkerProfile;
use crate::store::central::CentralStore;

/// Central attendance database on MySQL.
pub struct MySqlCentralStore {
    pool: MySqlPool,
    device_name: String,
}

impl MySqlCentralStore {
    pub fn new(pool: MySqlPool, device_name: impl Into<String>) -> Self {
        Self {
            pool,
            device_name: device_name.into(),
        }
    }
}

#[async_trait]
impl CentralStore for MySqlCentralStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_record(&self, worker_id: WorkerId, date: NaiveDate) -> Result<Option<CentralRecord>> {
        let record = sqlx::query_as::<_, CentralRecord>(
            r#"
            SELECT CAST(attendance_id AS SIGNED) AS attendance_id,
                   CAST(worker_id AS SIGNED) AS worker_id,
                   attendance_date, time_in, time_out
            FROM attendance
            WHERE worker_id = ? AND attendance_date = ?
            AND is_archived = 0
            LIMIT 1
            "#,
        )
        .bind(worker_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert_record(&self, record: &NewCentralRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (worker_id, attendance_date, time_in, time_out, status, hours_worked,
             created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(record.worker_id)
        .bind(record.attendance_date)
        .bind(record.time_in)
        .bind(record.time_out)
        .bind(&record.status)
        .bind(record.hours_worked)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_id() as i64)
    }

    async fn apply_time_out(&self, attendance_id: i64, time_out: NaiveTime, hours_worked: f64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE attendance
            SET time_out = ?, hours_worked = ?, updated_at = NOW()
            WHERE attendance_id = ?
            AND time_out IS NULL
            AND is_archived = 0
            "#,
        )
        .bind(time_out)
        .bind(hours_worked)
        .bind(attendance_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn append_audit(&self, entry: &AuditEntry) -> Result<()> {
        let clock = entry.timestamp.format("%I:%M %p").to_string();
        let date = entry.timestamp.date().to_string();
        let (new_values, summary_tail) = match entry.action {
            AuditAction::TimeIn => (
                json!({ "worker_id": entry.worker_id, "time_in": clock, "date": date }),
                format!("clocked in via facial recognition at {clock}"),
            ),
            AuditAction::TimeOut => (
                json!({
                    "worker_id": entry.worker_id,
                    "time_out": clock,
                    "hours_worked": entry.hours_worked,
                    "date": date,
                }),
                format!(
                    "clocked out via facial recognition at {clock}. Hours: {}",
                    entry.hours_worked.unwrap_or_default()
                ),
            ),
        };
        let title = match entry.action {
            AuditAction::TimeIn => "Biometric Time In",
            AuditAction::TimeOut => "Biometric Time Out",
        };

        // worker name comes from the same statement; unknown workers insert nothing
        let result = sqlx::query(
            r#"
            INSERT INTO audit_trail
            (user_id, username, user_level, action_type, module, table_name,
             record_id, record_identifier, new_values, changes_summary,
             ip_address, user_agent, severity, is_sensitive, success)
            SELECT NULL, CONCAT(first_name, ' ', last_name), 'worker', ?, 'attendance', 'attendance',
                   ?, CONCAT(first_name, ' ', last_name, ' (', worker_code, ')'), ?,
                   CONCAT(?, ' - ', first_name, ' ', last_name, ' ', ?),
                   'facial_recognition_system', ?, 'low', 0, 1
            FROM workers
            WHERE worker_id = ?
            "#,
        )
        .bind(entry.action.to_string())
        .bind(entry.attendance_id)
        .bind(new_values.to_string())
        .bind(title)
        .bind(summary_tail)
        .bind(&self.device_name)
        .bind(entry.worker_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(worker_id = entry.worker_id, "Audit skipped: worker not found");
        }
        Ok(())
    }

    async fn list_workers(&self, project_id: Option<i64>) -> Result<Vec<WorkerProfile>> {
        let workers = match project_id {
            Some(project_id) => {
                sqlx::query_as::<_, WorkerProfile>(
                    r#"
                    SELECT CAST(w.worker_id AS SIGNED) AS worker_id,
                           w.first_name, w.last_name, w.worker_code
                    FROM workers w
                    JOIN project_workers pw ON pw.worker_id = w.worker_id
                    WHERE pw.project_id = ? AND pw.is_active = 1
                    AND w.is_archived = 0
                    "#,
                )
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WorkerProfile>(
                    r#"
                    SELECT CAST(worker_id AS SIGNED) AS worker_id,
                           first_name, last_name, worker_code
                    FROM workers
                    WHERE is_archived = 0
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(workers)
    }

    async fn daily_summary(&self, date: NaiveDate, project_id: Option<i64>) -> Result<DailySummary> {
        let (present, completed): (i64, i64) = match project_id {
            Some(project_id) => {
                sqlx::query_as(
                    r#"
                    SELECT
                        COUNT(DISTINCT a.worker_id),
                        COUNT(DISTINCT CASE WHEN a.time_out IS NOT NULL THEN a.worker_id END)
                    FROM attendance a
                    JOIN project_workers pw ON a.worker_id = pw.worker_id
                    WHERE a.attendance_date = ?
                    AND a.is_archived = 0
                    AND pw.project_id = ?
                    AND pw.is_active = 1
                    "#,
                )
                .bind(date)
                .bind(project_id)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    SELECT
                        COUNT(DISTINCT worker_id),
                        COUNT(DISTINCT CASE WHEN time_out IS NOT NULL THEN worker_id END)
                    FROM attendance
                    WHERE attendance_date = ?
                    AND is_archived = 0
                    "#,
                )
                .bind(date)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(DailySummary { present, completed })
    }
}
