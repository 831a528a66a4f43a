//! Vote types and the toggle state machine.
//!
//! A voter holds at most one vote per target. Casting is a three-way toggle:
//! a first cast inserts, the opposite polarity flips the existing row, and
//! the same polarity again removes it. Counts are never stored; they are
//! tallied from the rows that exist at read time.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  ValidationError,
  ids::{PostId, ReplyId, UserId, VoteId},
};

// ─── Polarity ────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VoteType {
  Upvote,
  Downvote,
}

impl VoteType {
  /// Parse the wire/storage form (`"upvote"` | `"downvote"`).
  pub fn parse(raw: &str) -> Result<Self, ValidationError> {
    raw
      .parse()
      .map_err(|_| ValidationError::InvalidVoteType(raw.to_owned()))
  }
}

// ─── Target ──────────────────────────────────────────────────────────────────

/// What a vote is attached to. Exactly one of post or reply, by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum VoteTarget {
  Post(PostId),
  Reply(ReplyId),
}

impl VoteTarget {
  pub fn kind(&self) -> TargetKind {
    match self {
      Self::Post(_) => TargetKind::Post,
      Self::Reply(_) => TargetKind::Reply,
    }
  }

  pub fn post_id(&self) -> Option<PostId> {
    match self {
      Self::Post(id) => Some(*id),
      Self::Reply(_) => None,
    }
  }

  pub fn reply_id(&self) -> Option<ReplyId> {
    match self {
      Self::Post(_) => None,
      Self::Reply(id) => Some(*id),
    }
  }
}

impl fmt::Display for VoteTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Post(id) => write!(f, "post {id}"),
      Self::Reply(id) => write!(f, "reply {id}"),
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TargetKind {
  Post,
  Reply,
}

/// Which of a voter's votes [`crate::store::VoteLedger::vote_history`]
/// returns.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HistoryFilter {
  #[default]
  All,
  Posts,
  Replies,
}

impl HistoryFilter {
  pub fn parse(raw: &str) -> Result<Self, ValidationError> {
    raw
      .parse()
      .map_err(|_| ValidationError::InvalidHistoryFilter(raw.to_owned()))
  }

  pub fn admits(self, target: &VoteTarget) -> bool {
    match (self, target) {
      (Self::All, _) => true,
      (Self::Posts, VoteTarget::Post(_)) => true,
      (Self::Replies, VoteTarget::Reply(_)) => true,
      _ => false,
    }
  }
}

// ─── Vote ────────────────────────────────────────────────────────────────────

/// A voter's current polarity on one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
  pub vote_id:    VoteId,
  pub voter_id:   UserId,
  pub target:     VoteTarget,
  pub vote_type:  VoteType,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// The result of [`crate::store::VoteLedger::cast_vote`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CastOutcome {
  /// No previous vote; a new row was inserted.
  Created { vote: Vote },
  /// The previous vote had the other polarity and was flipped in place.
  Switched { vote: Vote, previous: VoteType },
  /// The same polarity was cast again, so the vote was withdrawn.
  Removed { previous: VoteType },
}

impl CastOutcome {
  /// The vote that stands after the cast, if any.
  pub fn vote(&self) -> Option<&Vote> {
    match self {
      Self::Created { vote } | Self::Switched { vote, .. } => Some(vote),
      Self::Removed { .. } => None,
    }
  }
}

// ─── Toggle state machine ────────────────────────────────────────────────────

/// The write a cast resolves to, given the voter's existing vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
  Insert,
  Switch { vote_id: VoteId, previous: VoteType },
  Remove { vote_id: VoteId, previous: VoteType },
}

impl VoteTransition {
  /// Decide what casting `requested` does on top of `existing`.
  pub fn plan(existing: Option<(VoteId, VoteType)>, requested: VoteType) -> Self {
    match existing {
      None => Self::Insert,
      Some((vote_id, previous)) if previous == requested => {
        Self::Remove { vote_id, previous }
      }
      Some((vote_id, previous)) => Self::Switch { vote_id, previous },
    }
  }
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Controversy score above which content counts as controversial.
pub const CONTROVERSY_THRESHOLD: f64 = 0.7;

/// Derived score for a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteCounts {
  pub upvotes:   u64,
  pub downvotes: u64,
  /// `upvotes - downvotes`
  pub net:       i64,
  /// `upvotes + downvotes`
  pub total:     u64,
}

impl VoteCounts {
  pub fn from_tally(upvotes: u64, downvotes: u64) -> Self {
    Self {
      upvotes,
      downvotes,
      net: upvotes as i64 - downvotes as i64,
      total: upvotes + downvotes,
    }
  }

  /// Count polarities directly.
  pub fn tally<I>(votes: I) -> Self
  where
    I: IntoIterator<Item = VoteType>,
  {
    let (up, down) = votes.into_iter().fold((0, 0), |(up, down), v| match v {
      VoteType::Upvote => (up + 1, down),
      VoteType::Downvote => (up, down + 1),
    });
    Self::from_tally(up, down)
  }

  /// `1 - |upvote_ratio - 0.5| * 2`: 1.0 for an even split, 0.0 for a
  /// unanimous one. `None` when there are no votes.
  pub fn controversy(&self) -> Option<f64> {
    if self.total == 0 {
      return None;
    }
    let ratio = self.upvotes as f64 / self.total as f64;
    Some(1.0 - (ratio - 0.5).abs() * 2.0)
  }
}

/// A target together with its counts, as returned by ranking queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tally {
  pub target: VoteTarget,
  pub votes:  VoteCounts,
}

/// A target whose votes are close to evenly split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Controversial {
  pub target: VoteTarget,
  pub votes:  VoteCounts,
  pub score:  f64,
}

/// Ledger-wide totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStats {
  pub total_votes:        u64,
  pub upvotes:            u64,
  pub downvotes:          u64,
  /// Distinct users holding at least one vote.
  pub active_voters:      u64,
  pub posts_with_votes:   u64,
  pub replies_with_votes: u64,
}

/// Order tallies by net score, highest first; ties keep the lower id first.
pub fn rank_by_net(tallies: &mut [Tally]) {
  tallies.sort_by(|a, b| {
    b.votes
      .net
      .cmp(&a.votes.net)
      .then_with(|| target_key(&a.target).cmp(&target_key(&b.target)))
  });
}

/// Keep the tallies that qualify as controversial, most contested first.
///
/// Posts and replies compete in one list capped at `limit`, rather than as
/// two separate lists of `limit / 2` each. A busy kind can therefore fill
/// the whole list.
pub fn select_controversial(
  tallies: impl IntoIterator<Item = Tally>,
  min_total: u64,
  limit: usize,
) -> Vec<Controversial> {
  let mut picked: Vec<Controversial> = tallies
    .into_iter()
    .filter(|t| t.votes.total >= min_total)
    .filter_map(|t| {
      let score = t.votes.controversy()?;
      (score > CONTROVERSY_THRESHOLD).then_some(Controversial {
        target: t.target,
        votes: t.votes,
        score,
      })
    })
    .collect();
  picked.sort_by(|a, b| {
    b.score
      .total_cmp(&a.score)
      .then_with(|| b.votes.total.cmp(&a.votes.total))
      .then_with(|| target_key(&a.target).cmp(&target_key(&b.target)))
  });
  picked.truncate(limit);
  picked
}

fn target_key(target: &VoteTarget) -> (u8, i64) {
  match target {
    VoteTarget::Post(id) => (0, id.get()),
    VoteTarget::Reply(id) => (1, id.get()),
  }
}
