//! Error type for `tagbook-store-sqlite`.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Connectivity, constraint violation, or any other failure of a batch.
  /// The batch has been rolled back.
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The timestamp has no fixed-width encoding; nothing was written.
  #[error("timestamp {0} is outside years 0000-9999")]
  TimestampOutOfRange(DateTime<Utc>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
