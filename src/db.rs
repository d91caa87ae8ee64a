use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::Result;

/// Central MySQL pool. Connects lazily so the device starts offline when the
/// server is unreachable; a single connection keeps writes serialized.
pub fn init_central(database_url: &str, acquire_timeout: Duration) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(acquire_timeout)
        .connect_lazy(database_url)?;
    Ok(pool)
}

/// Local SQLite buffer at `path`, created along with its directory if missing.
pub async fn init_buffer(path: &str) -> Result<SqlitePool> {
    if let Some(dir) = Path::new(path).parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).map_err(sqlx::Error::Io)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    connect_buffer(options).await
}

/// In-memory buffer, used by tests and dry runs.
pub async fn init_memory_buffer() -> Result<SqlitePool> {
    connect_buffer(SqliteConnectOptions::from_str("sqlite::memory:")?).await
}

async fn connect_buffer(options: SqliteConnectOptions) -> Result<SqlitePool> {
    // one connection: single writer, and an in-memory database stays shared
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    Ok(pool)
}
