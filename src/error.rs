//! Error types shared by the stores, the state machine and the sync engine.

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::attendance::WorkerId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("central store unavailable: {0}")]
    Unavailable(String),

    #[error("central store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("no open time-in for worker {worker_id} on {date}")]
    Orphan { worker_id: WorkerId, date: NaiveDate },

    #[error("inconsistent record: {0}")]
    Inconsistent(String),

    #[error("sync transport error: {0}")]
    Transport(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this failure means the central store cannot be reached,
    /// as opposed to a rejected or malformed write.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Error::Unavailable(_) | Error::Timeout(_) => true,
            Error::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
                    | sqlx::Error::Protocol(_)
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
