//! The [`ReplyTree`] and [`VoteLedger`] traits and their query types.
//!
//! The traits are implemented by storage backends (e.g. `agora-store-sqlite`).
//! Higher layers (`agora-cli`) depend on these abstractions, not on any
//! concrete backend.
//!
//! Callers are assumed to have authenticated and authorised the acting user
//! already; the traits only enforce data invariants.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  ids::{PostId, ReplyId, UserId, VoteId},
  reply::{NewReply, Reply, ReplyStats, ReplyView},
  vote::{
    CastOutcome, Controversial, HistoryFilter, TargetKind, Tally, Vote,
    VoteCounts, VoteTarget, VoteType, VotingStats,
  },
};

// ─── Pagination ──────────────────────────────────────────────────────────────

/// Offset pagination applied after ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
  pub skip:  usize,
  pub limit: usize,
}

impl Page {
  pub const DEFAULT_LIMIT: usize = 100;

  pub fn new(skip: usize, limit: usize) -> Self { Self { skip, limit } }

  /// Apply the page to an already-ordered sequence.
  pub fn slice<T>(self, items: impl IntoIterator<Item = T>) -> Vec<T> {
    items.into_iter().skip(self.skip).take(self.limit).collect()
  }
}

impl Default for Page {
  fn default() -> Self { Self::new(0, Self::DEFAULT_LIMIT) }
}

// ─── Reply tree ──────────────────────────────────────────────────────────────

/// Owner of the reply hierarchy under each post.
///
/// Navigation methods start from a live (non-deleted) reply and report
/// `NotFound` otherwise. Structural answers (`ancestors`, `thread_root`,
/// `depth`) include soft-deleted replies, because deletion never severs tree
/// edges. Collections (`descendants`, `siblings`, `thread_of`, listings) walk
/// through soft-deleted replies without returning them.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ReplyTree: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Validate and persist a new reply.
  ///
  /// Errors: invalid content; post missing or deleted; author missing;
  /// parent missing, deleted or on another post; parent too deep.
  fn create_reply(
    &self,
    input: NewReply,
  ) -> impl Future<Output = Result<Reply, Self::Error>> + Send + '_;

  /// Replace the content of a live reply; `updated_at` strictly advances.
  fn update_reply(
    &self,
    id: ReplyId,
    content: String,
  ) -> impl Future<Output = Result<Reply, Self::Error>> + Send + '_;

  /// Mark a live reply deleted. Children and content are left untouched.
  fn soft_delete_reply(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Soft-delete every live reply in `ids`; returns how many changed.
  fn bulk_soft_delete(
    &self,
    ids: Vec<ReplyId>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Single reply ──────────────────────────────────────────────────────

  /// A live reply, or `None` if it is missing or soft-deleted.
  fn get_reply(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<Option<Reply>, Self::Error>> + Send + '_;

  /// The computed [`ReplyView`] of a live reply.
  fn view_reply(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<Option<ReplyView>, Self::Error>> + Send + '_;

  fn reply_stats(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<ReplyStats, Self::Error>> + Send + '_;

  // ── Navigation ────────────────────────────────────────────────────────

  fn depth(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;

  fn thread_root(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<Reply, Self::Error>> + Send + '_;

  /// Parent first, root last.
  fn ancestors(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  /// Pre-order, children chronological.
  fn descendants(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  fn siblings(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  fn is_ancestor_of(
    &self,
    ancestor: ReplyId,
    of: ReplyId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Direct live children, chronological.
  fn children(
    &self,
    id: ReplyId,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  /// The thread root and all its live descendants, chronological.
  fn thread_of(
    &self,
    id: ReplyId,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  // ── Listings ──────────────────────────────────────────────────────────

  /// Live replies on a post, chronological.
  fn list_by_post(
    &self,
    post_id: PostId,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  /// Live replies on a post in threaded (pre-order) order; `page` applies
  /// to the flattened sequence.
  fn list_by_post_threaded(
    &self,
    post_id: PostId,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  /// `ListReplies`: flat or threaded depending on `threaded`.
  fn list_replies(
    &self,
    post_id: PostId,
    page: Page,
    threaded: bool,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_ {
    async move {
      if threaded {
        self.list_by_post_threaded(post_id, page).await
      } else {
        self.list_by_post(post_id, page).await
      }
    }
  }

  fn count_replies(
    &self,
    post_id: PostId,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Live replies by one author, newest first.
  fn replies_by_author(
    &self,
    author_id: UserId,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;

  /// Case-insensitive substring search within one post, chronological.
  fn search_replies<'a>(
    &'a self,
    post_id: PostId,
    term: &'a str,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + 'a;

  /// Newest live replies across all posts.
  fn recent_replies(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Reply>, Self::Error>> + Send + '_;
}

// ─── Vote ledger ─────────────────────────────────────────────────────────────

/// Owner of the one-vote-per-voter-per-target ledger.
pub trait VoteLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Apply the insert / switch / remove toggle for `voter` on `target`.
  ///
  /// Concurrent casts by the same voter on the same target are resolved by
  /// the backend; the caller sees exactly one of the three outcomes.
  fn cast_vote(
    &self,
    voter: UserId,
    target: VoteTarget,
    vote_type: VoteType,
  ) -> impl Future<Output = Result<CastOutcome, Self::Error>> + Send + '_;

  /// Counts tallied from the rows present right now.
  fn vote_counts(
    &self,
    target: VoteTarget,
  ) -> impl Future<Output = Result<VoteCounts, Self::Error>> + Send + '_;

  fn vote_of(
    &self,
    voter: UserId,
    target: VoteTarget,
  ) -> impl Future<Output = Result<Option<Vote>, Self::Error>> + Send + '_;

  /// A voter's votes, most recent first.
  fn vote_history(
    &self,
    voter: UserId,
    filter: HistoryFilter,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Vote>, Self::Error>> + Send + '_;

  /// Every vote on a target, oldest first.
  fn votes_for(
    &self,
    target: VoteTarget,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Vote>, Self::Error>> + Send + '_;

  /// Delete one vote row by id. Returns `false` if it did not exist.
  fn retract_vote(
    &self,
    id: VoteId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every vote cast by `voter`; returns how many rows went.
  fn purge_voter(
    &self,
    voter: UserId,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Live targets of `kind` ranked by net votes. `within` restricts reply
  /// rankings to one post and is ignored for posts.
  ///
  /// With `since`, only targets that received a vote at or after that
  /// instant are ranked. Their counts still cover every vote they hold.
  fn top_voted(
    &self,
    kind: TargetKind,
    within: Option<PostId>,
    since: Option<DateTime<Utc>>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Tally>, Self::Error>> + Send + '_;

  /// Live posts and replies with at least `min_total` votes whose split is
  /// close to even, most contested first.
  fn controversial(
    &self,
    min_total: u64,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Controversial>, Self::Error>> + Send + '_;

  /// Totals over every row in the ledger.
  fn voting_stats(
    &self,
  ) -> impl Future<Output = Result<VotingStats, Self::Error>> + Send + '_;
}
