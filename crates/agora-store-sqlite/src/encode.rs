//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 UTC strings with exactly six fractional digits,
//! so comparing the text in SQL agrees with comparing the instants. Vote
//! targets become the nullable `(post_id, reply_id)` column pair only here.

use agora_core::{
  ids::{PostId, ReplyId, UserId, VoteId},
  reply::Reply,
  vote::{Vote, VoteTarget, VoteType},
};
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current instant at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

/// A timestamp strictly later than `previous`, normally just [`now`].
pub fn advance(previous: DateTime<Utc>) -> DateTime<Utc> {
  now().max(previous + Duration::microseconds(1))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── VoteType ────────────────────────────────────────────────────────────────

pub fn decode_vote_type(s: &str) -> Result<VoteType> {
  VoteType::parse(s).map_err(|e| Error::CorruptRow(e.to_string()))
}

// ─── VoteTarget ──────────────────────────────────────────────────────────────

/// `(post_id, reply_id)` with exactly one side set.
pub fn encode_target(t: VoteTarget) -> (Option<i64>, Option<i64>) {
  match t {
    VoteTarget::Post(id) => (Some(id.get()), None),
    VoteTarget::Reply(id) => (None, Some(id.get())),
  }
}

pub fn decode_target(post_id: Option<i64>, reply_id: Option<i64>) -> Result<VoteTarget> {
  match (post_id, reply_id) {
    (Some(p), None) => Ok(VoteTarget::Post(PostId(p))),
    (None, Some(r)) => Ok(VoteTarget::Reply(ReplyId(r))),
    (p, r) => Err(Error::CorruptRow(format!(
      "vote must target exactly one of post/reply (post_id={p:?}, reply_id={r:?})"
    ))),
  }
}

// ─── Pagination ──────────────────────────────────────────────────────────────

/// A `LIMIT`/`OFFSET` operand; SQLite integers are signed.
pub fn sql_count(n: usize) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

// ─── Search ──────────────────────────────────────────────────────────────────

/// A `LIKE ... ESCAPE '\'` pattern matching `term` anywhere.
pub fn like_pattern(term: &str) -> String {
  let mut escaped = String::with_capacity(term.len() + 2);
  escaped.push('%');
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`read_reply`].
pub const REPLY_COLUMNS: &str = "reply_id, post_id, author_id, content, \
                                 parent_id, created_at, updated_at, deleted_at";

/// Column list matching [`read_vote`].
pub const VOTE_COLUMNS: &str = "vote_id, user_id, post_id, reply_id, \
                                vote_type, created_at, updated_at";

/// Raw values read directly from a `replies` row.
pub struct RawReply {
  pub reply_id:   i64,
  pub post_id:    i64,
  pub author_id:  i64,
  pub content:    String,
  pub parent_id:  Option<i64>,
  pub created_at: String,
  pub updated_at: String,
  pub deleted_at: Option<String>,
}

pub fn read_reply(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawReply> {
  Ok(RawReply {
    reply_id:   row.get(0)?,
    post_id:    row.get(1)?,
    author_id:  row.get(2)?,
    content:    row.get(3)?,
    parent_id:  row.get(4)?,
    created_at: row.get(5)?,
    updated_at: row.get(6)?,
    deleted_at: row.get(7)?,
  })
}

impl RawReply {
  pub fn into_reply(self) -> Result<Reply> {
    Ok(Reply {
      reply_id:   ReplyId(self.reply_id),
      post_id:    PostId(self.post_id),
      author_id:  UserId(self.author_id),
      content:    self.content,
      parent_id:  self.parent_id.map(ReplyId),
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read directly from a `votes` row.
pub struct RawVote {
  pub vote_id:    i64,
  pub user_id:    i64,
  pub post_id:    Option<i64>,
  pub reply_id:   Option<i64>,
  pub vote_type:  String,
  pub created_at: String,
  pub updated_at: String,
}

pub fn read_vote(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawVote> {
  Ok(RawVote {
    vote_id:    row.get(0)?,
    user_id:    row.get(1)?,
    post_id:    row.get(2)?,
    reply_id:   row.get(3)?,
    vote_type:  row.get(4)?,
    created_at: row.get(5)?,
    updated_at: row.get(6)?,
  })
}

impl RawVote {
  pub fn into_vote(self) -> Result<Vote> {
    Ok(Vote {
      vote_id:    VoteId(self.vote_id),
      voter_id:   UserId(self.user_id),
      target:     decode_target(self.post_id, self.reply_id)?,
      vote_type:  decode_vote_type(&self.vote_type)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub fn into_replies(raws: Vec<RawReply>) -> Result<Vec<Reply>> {
  raws.into_iter().map(RawReply::into_reply).collect()
}

pub fn into_votes(raws: Vec<RawVote>) -> Result<Vec<Vote>> {
  raws.into_iter().map(RawVote::into_vote).collect()
}
