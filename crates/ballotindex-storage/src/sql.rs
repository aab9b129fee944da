//! Helpers shared by the `sqlx` backends.

use chrono::{DateTime, Utc};

use ballotindex_core::error::IndexerError;

pub(crate) fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// Timestamps are stored as Unix milliseconds in a BIGINT column.
pub(crate) fn to_millis(at: &DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, IndexerError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| IndexerError::Storage(format!("timestamp out of range: {ms}")))
}

/// `true` when an insert-or-noop statement created the row.
pub(crate) fn created(rows_affected: u64) -> bool {
    rows_affected > 0
}
