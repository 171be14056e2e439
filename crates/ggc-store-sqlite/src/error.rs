//! Error type for `ggc-store-sqlite`.

use ggc_core::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ggc_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown upload type: {0:?}")]
  UnknownUploadType(String),
}

impl From<ggc_core::IntegrityViolation> for Error {
  fn from(violation: ggc_core::IntegrityViolation) -> Self { Self::Core(violation.into()) }
}

impl DomainError for Error {
  fn domain(&self) -> Option<&ggc_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
