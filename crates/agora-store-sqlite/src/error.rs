//! Error type for `agora-store-sqlite`.

use agora_core::{Entity, ValidationError, vote::VoteTarget};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0} not found")]
  NotFound(Entity),

  #[error("validation error: {0}")]
  Validation(#[from] ValidationError),

  /// A vote cast kept colliding with concurrent writers on the same
  /// (voter, target) pair. Transient: the caller may retry.
  #[error("vote on {target} still conflicted after {attempts} attempts")]
  Conflict { target: VoteTarget, attempts: u32 },

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row violates an invariant the schema should have enforced.
  #[error("corrupt row: {0}")]
  CorruptRow(String),
}

impl From<agora_core::Error> for Error {
  fn from(e: agora_core::Error) -> Self {
    match e {
      agora_core::Error::NotFound(entity) => Self::NotFound(entity),
      agora_core::Error::Validation(v) => Self::Validation(v),
    }
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(e.into()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
