//! Local SQLite buffer.
//!
//! Every write that could not reach the central store lands here with
//! `sync_status = 'pending'` and stays until the sync engine marks it synced.

use chrono::{NaiveDate, NaiveTime};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::Result;
use crate::model::attendance::{
    BufferId, BufferedRecord, STATUS_PRESENT, SyncStatus, WorkerId,
};
use crate::model::sync::SystemEvent;

const BUFFER_COLUMNS: &str = "id, worker_id, attendance_date, time_in, time_out, status, \
                              hours_worked, sync_status, created_at, synced_at";

#[derive(Clone)]
pub struct LocalBuffer {
    pool: SqlitePool,
}

impl LocalBuffer {
    /// Wrap a pool and make sure the buffer tables exist.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        let buffer = Self { pool };
        buffer.init().await?;
        Ok(buffer)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS attendance_buffer (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                worker_id INTEGER NOT NULL,
                attendance_date TEXT NOT NULL,
                time_in TEXT,
                time_out TEXT,
                status TEXT NOT NULL DEFAULT 'present',
                hours_worked REAL NOT NULL DEFAULT 0,
                sync_status TEXT NOT NULL DEFAULT 'pending',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                synced_at TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_buffer_worker_date
            ON attendance_buffer (worker_id, attendance_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS system_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                description TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS device_config (
                key TEXT PRIMARY KEY,
                value TEXT,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Local buffer initialized");
        Ok(())
    }

    /// Buffer a time-in. Returns the new buffer id.
    pub async fn insert_time_in(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        time_in: NaiveTime,
    ) -> Result<BufferId> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendance_buffer (worker_id, attendance_date, time_in, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(worker_id)
        .bind(date)
        .bind(time_in)
        .bind(STATUS_PRESENT)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        info!(worker_id, buffer_id = id, "Buffered time-in");
        Ok(id)
    }

    /// Buffer a time-out for a day whose time-in is already known.
    ///
    /// Closes the open pending row for the worker/date if there is one,
    /// otherwise appends a full pending row carrying the time-in as well so
    /// the sync engine can replay the complete record.
    pub async fn record_time_out(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        time_in: NaiveTime,
        time_out: NaiveTime,
        hours_worked: f64,
    ) -> Result<BufferId> {
        let mut tx = self.pool.begin().await?;

        let open: Option<(BufferId,)> = sqlx::query_as(
            r#"
            SELECT id FROM attendance_buffer
            WHERE worker_id = ? AND attendance_date = ?
            AND time_out IS NULL AND sync_status = 'pending'
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(worker_id)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;

        let id = match open {
            Some((id,)) => {
                sqlx::query(
                    "UPDATE attendance_buffer SET time_out = ?, hours_worked = ? WHERE id = ?",
                )
                .bind(time_out)
                .bind(hours_worked)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => sqlx::query(
                r#"
                INSERT INTO attendance_buffer
                (worker_id, attendance_date, time_in, time_out, status, hours_worked)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(worker_id)
            .bind(date)
            .bind(time_in)
            .bind(time_out)
            .bind(STATUS_PRESENT)
            .bind(hours_worked)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        };

        tx.commit().await?;
        info!(worker_id, buffer_id = id, hours_worked, "Buffered time-out");
        Ok(id)
    }

    pub async fn get(&self, id: BufferId) -> Result<Option<BufferedRecord>> {
        let sql = format!("SELECT {BUFFER_COLUMNS} FROM attendance_buffer WHERE id = ?");
        let record = sqlx::query_as::<_, BufferedRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Most recent buffered row for the worker/date, optionally pending only.
    pub async fn latest_for_day(
        &self,
        worker_id: WorkerId,
        date: NaiveDate,
        pending_only: bool,
    ) -> Result<Option<BufferedRecord>> {
        let filter = if pending_only {
            "AND sync_status = 'pending'"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {BUFFER_COLUMNS} FROM attendance_buffer \
             WHERE worker_id = ? AND attendance_date = ? {filter} \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let record = sqlx::query_as::<_, BufferedRecord>(&sql)
            .bind(worker_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// All pending rows, oldest first.
    pub async fn pending(&self) -> Result<Vec<BufferedRecord>> {
        let sql = format!(
            "SELECT {BUFFER_COLUMNS} FROM attendance_buffer \
             WHERE sync_status = 'pending' ORDER BY created_at ASC, id ASC"
        );
        let records = sqlx::query_as::<_, BufferedRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    pub async fn pending_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_buffer WHERE sync_status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn mark_synced(&self, id: BufferId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE attendance_buffer
            SET sync_status = ?, synced_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(SyncStatus::Synced.to_string())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_event(&self, event_type: &str, description: &str) -> Result<()> {
        sqlx::query("INSERT INTO system_events (event_type, description) VALUES (?, ?)")
            .bind(event_type)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn events(&self, event_type: &str, limit: i64) -> Result<Vec<SystemEvent>> {
        let events = sqlx::query_as::<_, SystemEvent>(
            r#"
            SELECT id, event_type, description, created_at
            FROM system_events
            WHERE event_type = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(event_type)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    pub async fn event_count(&self, event_type: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM system_events WHERE event_type = ?")
            .bind(event_type)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn device_config(&self, key: &str) -> Result<Option<String>> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM device_config WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten())
    }

    pub async fn set_device_config(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO device_config (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
