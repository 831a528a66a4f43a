//! Error types for `agora-core`.

use serde::Serialize;
use thiserror::Error;

/// The kind of record a [`Error::NotFound`] refers to.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Entity {
  Post,
  Reply,
  /// The parent named when creating a reply: missing, deleted, or on
  /// another post.
  Parent,
  Author,
  Voter,
  Vote,
}

/// Input rejected before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("reply content cannot be empty")]
  EmptyContent,

  #[error("reply content cannot exceed {max} characters (got {len})")]
  ContentTooLong { len: usize, max: usize },

  #[error("maximum reply depth exceeded: parent is at depth {parent_depth}")]
  MaxDepthExceeded { parent_depth: u32 },

  #[error("invalid vote type: {0:?}")]
  InvalidVoteType(String),

  #[error("invalid history filter: {0:?}")]
  InvalidHistoryFilter(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("{0} not found")]
  NotFound(Entity),

  #[error("validation error: {0}")]
  Validation(#[from] ValidationError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
