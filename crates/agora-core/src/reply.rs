//! Reply types: one node in a post's comment tree.
//!
//! Replies are flat records. The tree is implied by `parent_id` and is
//! re-derived on every read by [`crate::tree::ReplyForest`]; nothing about the
//! hierarchy (depth, children) is ever stored on the record itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  ValidationError,
  ids::{PostId, ReplyId, UserId},
  vote::VoteCounts,
};

// ─── Limits ──────────────────────────────────────────────────────────────────

/// Longest permitted reply body, counted in characters after trimming.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Deepest depth a reply may sit at. Root replies are depth 0, so a thread
/// holds ten levels and a reply at this depth accepts no children.
pub const MAX_REPLY_DEPTH: u32 = 9;

/// Whether a reply at `depth` may receive a child.
pub fn can_reply_to(depth: u32) -> bool { depth < MAX_REPLY_DEPTH }

/// Trim `raw` and check it against the content rules.
///
/// Returns the trimmed content, which is what gets stored.
pub fn normalize_content(raw: &str) -> Result<String, ValidationError> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(ValidationError::EmptyContent);
  }
  let len = trimmed.chars().count();
  if len > MAX_CONTENT_CHARS {
    return Err(ValidationError::ContentTooLong {
      len,
      max: MAX_CONTENT_CHARS,
    });
  }
  Ok(trimmed.to_owned())
}

// ─── Reply ───────────────────────────────────────────────────────────────────

/// A persisted reply. Soft-deleted replies keep their content and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
  pub reply_id:   ReplyId,
  pub post_id:    PostId,
  pub author_id:  UserId,
  pub content:    String,
  /// Always a reply on the same post, or `None` for a root-level reply.
  pub parent_id:  Option<ReplyId>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub deleted_at: Option<DateTime<Utc>>,
}

impl Reply {
  pub fn is_root(&self) -> bool { self.parent_id.is_none() }

  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }

  /// True once the content has been changed after creation.
  pub fn is_edited(&self) -> bool { self.updated_at > self.created_at }
}

// ─── NewReply ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::ReplyTree::create_reply`]. Timestamps and the id
/// are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewReply {
  pub post_id:   PostId,
  pub author_id: UserId,
  pub content:   String,
  pub parent_id: Option<ReplyId>,
}

impl NewReply {
  /// A root-level reply on `post_id`.
  pub fn new(post_id: PostId, author_id: UserId, content: impl Into<String>) -> Self {
    Self {
      post_id,
      author_id,
      content: content.into(),
      parent_id: None,
    }
  }

  /// Nest the reply under `parent_id`.
  pub fn under(mut self, parent_id: ReplyId) -> Self {
    self.parent_id = Some(parent_id);
    self
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// The computed presentation of a reply: never stored, always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyView {
  #[serde(flatten)]
  pub reply:        Reply,
  pub depth:        u32,
  pub can_reply_to: bool,
  pub is_edited:    bool,
  pub votes:        VoteCounts,
}

impl ReplyView {
  pub fn new(reply: Reply, depth: u32, votes: VoteCounts) -> Self {
    let is_edited = reply.is_edited();
    Self {
      reply,
      depth,
      can_reply_to: can_reply_to(depth),
      is_edited,
      votes,
    }
  }
}

/// Structural and scoring statistics for a single reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyStats {
  pub depth:            u32,
  /// Direct, non-deleted children.
  pub children_count:   usize,
  /// All non-deleted replies beneath this one.
  pub descendant_count: usize,
  pub total_votes:      u64,
}
