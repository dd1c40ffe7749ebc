//! Error taxonomy shared by the store, router and download paths.

use rusqlite::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
  /// The resource path matched none of the routes.
  #[error("unsupported resource: {0}")]
  UnsupportedResource(String),

  /// No usable network connection. Expected and recoverable.
  #[error("no usable network connection")]
  NoNetwork,

  #[error("failed to fetch {uri}: {reason}")]
  FetchFailure { uri: String, reason: String },

  #[error("local storage unavailable: {0}")]
  StorageUnavailable(String),

  #[error("constraint violation: {0}")]
  ConstraintViolation(String),

  #[error("database error: {0}")]
  Database(rusqlite::Error),

  #[error("remote service error: {0}")]
  Remote(String),

  #[error("failed to decode remote response: {0}")]
  Decode(#[from] serde_json::Error),
}

impl MirrorError {
  /// True for failures the periodic sweep is expected to recover from.
  pub fn is_recoverable(&self) -> bool {
    matches!(self, Self::NoNetwork | Self::FetchFailure { .. })
  }
}

impl From<rusqlite::Error> for MirrorError {
  fn from(err: rusqlite::Error) -> Self {
    match err {
      rusqlite::Error::SqliteFailure(ref e, ref msg) if e.code == ErrorCode::ConstraintViolation => {
        Self::ConstraintViolation(msg.clone().unwrap_or_else(|| e.to_string()))
      }
      other => Self::Database(other),
    }
  }
}

impl<T> From<std::sync::PoisonError<T>> for MirrorError {
  fn from(err: std::sync::PoisonError<T>) -> Self {
    Self::StorageUnavailable(format!("lock poisoned: {}", err))
  }
}
