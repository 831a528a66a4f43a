//! [`VoteLedger`] for [`SqliteStore`].
//!
//! A cast is read-decide-write. Each attempt runs in one `BEGIN IMMEDIATE`
//! transaction, which takes the write lock before the read, so two handles on
//! the same file cannot both decide from the same snapshot. If an attempt
//! still loses (a UNIQUE violation, or the lock wait timing out) it is rolled
//! back and retried from a fresh read, up to
//! [`StoreOptions::cast_attempts`](crate::StoreOptions::cast_attempts) times.

use agora_core::{
  Entity,
  ids::{PostId, UserId, VoteId},
  store::{Page, VoteLedger},
  vote::{
    CastOutcome, Controversial, HistoryFilter, TargetKind, Tally, Vote, VoteCounts,
    VoteTarget, VoteTransition, VoteType, VotingStats, rank_by_net, select_controversial,
  },
};
use chrono::{DateTime, Utc};
use rusqlite::{
  ErrorCode, OptionalExtension as _, TransactionBehavior, types::Type, types::Value,
};
use tracing::{debug, warn};

use crate::{
  Error, Result, SqliteStore,
  encode::{
    RawVote, VOTE_COLUMNS, advance, decode_target, encode_dt, encode_target, now, read_vote,
    sql_count,
  },
};

// ─── Cast attempts ───────────────────────────────────────────────────────────

/// What one committed attempt wrote, still in column form.
enum Applied {
  Created(RawVote),
  Switched(RawVote, VoteType),
  Removed(VoteType),
}

impl Applied {
  fn into_outcome(self) -> Result<CastOutcome> {
    Ok(match self {
      Self::Created(raw) => CastOutcome::Created {
        vote: raw.into_vote()?,
      },
      Self::Switched(raw, previous) => CastOutcome::Switched {
        vote: raw.into_vote()?,
        previous,
      },
      Self::Removed(previous) => CastOutcome::Removed { previous },
    })
  }
}

enum Attempt {
  Done(Applied),
  /// Lost to a concurrent writer; carries SQLite's message.
  Contended(String),
}

/// Whether `e` means another writer got to the same row or lock first.
fn is_contention(e: &rusqlite::Error) -> bool {
  match e {
    rusqlite::Error::SqliteFailure(f, _) => {
      f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        || matches!(f.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    }
    _ => false,
  }
}

fn column_error(
  idx: usize,
  e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
  rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// One transactional cast. Any early return drops the transaction, which
/// rolls it back.
fn apply_cast(
  conn: &mut rusqlite::Connection,
  voter: UserId,
  target: VoteTarget,
  requested: VoteType,
) -> rusqlite::Result<Applied> {
  let (post_id, reply_id) = encode_target(target);
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let existing: Option<(VoteId, VoteType, DateTime<Utc>)> = tx
    .query_row(
      "SELECT vote_id, vote_type, updated_at FROM votes
       WHERE user_id = ?1 AND post_id IS ?2 AND reply_id IS ?3",
      rusqlite::params![voter.get(), post_id, reply_id],
      |row| {
        let vote_type: String = row.get(1)?;
        let updated_at: String = row.get(2)?;
        Ok((
          VoteId(row.get(0)?),
          VoteType::parse(&vote_type).map_err(|e| column_error(1, e))?,
          DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|e| column_error(2, e))?
            .with_timezone(&Utc),
        ))
      },
    )
    .optional()?;

  let transition = VoteTransition::plan(
    existing.map(|(id, vote_type, _)| (id, vote_type)),
    requested,
  );
  let select_one = format!("SELECT {VOTE_COLUMNS} FROM votes WHERE vote_id = ?1");

  let applied = match transition {
    VoteTransition::Insert => {
      let at_str = encode_dt(now());
      tx.execute(
        "INSERT INTO votes (user_id, post_id, reply_id, vote_type, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        rusqlite::params![
          voter.get(),
          post_id,
          reply_id,
          requested.as_ref(),
          at_str,
        ],
      )?;
      let id = tx.last_insert_rowid();
      Applied::Created(tx.query_row(&select_one, rusqlite::params![id], read_vote)?)
    }
    VoteTransition::Switch { vote_id, previous } => {
      let updated_at = existing.map_or_else(now, |(_, _, at)| advance(at));
      tx.execute(
        "UPDATE votes SET vote_type = ?2, updated_at = ?3 WHERE vote_id = ?1",
        rusqlite::params![vote_id.get(), requested.as_ref(), encode_dt(updated_at)],
      )?;
      Applied::Switched(
        tx.query_row(&select_one, rusqlite::params![vote_id.get()], read_vote)?,
        previous,
      )
    }
    VoteTransition::Remove { vote_id, previous } => {
      tx.execute(
        "DELETE FROM votes WHERE vote_id = ?1",
        rusqlite::params![vote_id.get()],
      )?;
      Applied::Removed(previous)
    }
  };

  tx.commit()?;
  Ok(applied)
}

// ─── Aggregation helpers ─────────────────────────────────────────────────────

impl SqliteStore {
  async fn require_voter(&self, voter: UserId) -> Result<()> {
    if self.user_exists(voter).await? {
      Ok(())
    } else {
      Err(Error::NotFound(Entity::Voter))
    }
  }

  /// Counts for every live target of `kind` that has at least one vote.
  /// With `since`, a target also needs a vote cast at or after it.
  async fn tallies(
    &self,
    kind: TargetKind,
    within: Option<PostId>,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Tally>> {
    let within = within.map(|p| p.get());
    let since = since.map_or(Value::Null, |at| Value::Text(encode_dt(at)));
    let rows: Vec<(i64, i64, i64)> = self
      .conn
      .call(move |conn| {
        let (sql, params) = match kind {
          TargetKind::Post => (
            "SELECT v.post_id,
                    SUM(v.vote_type = 'upvote'),
                    SUM(v.vote_type = 'downvote')
             FROM votes v
             JOIN posts p ON p.post_id = v.post_id
             WHERE p.deleted_at IS NULL
             GROUP BY v.post_id
             HAVING ?1 IS NULL OR MAX(v.created_at) >= ?1",
            vec![since],
          ),
          TargetKind::Reply => (
            "SELECT v.reply_id,
                    SUM(v.vote_type = 'upvote'),
                    SUM(v.vote_type = 'downvote')
             FROM votes v
             JOIN replies r ON r.reply_id = v.reply_id
             JOIN posts p   ON p.post_id = r.post_id
             WHERE r.deleted_at IS NULL
               AND p.deleted_at IS NULL
               AND (?1 IS NULL OR r.post_id = ?1)
             GROUP BY v.reply_id
             HAVING ?2 IS NULL OR MAX(v.created_at) >= ?2",
            vec![within.map_or(Value::Null, Value::Integer), since],
          ),
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, up, down)| -> Result<Tally> {
        let target = match kind {
          TargetKind::Post => decode_target(Some(id), None)?,
          TargetKind::Reply => decode_target(None, Some(id))?,
        };
        Ok(Tally {
          target,
          votes: VoteCounts::from_tally(up as u64, down as u64),
        })
      })
      .collect()
  }
}

// ─── VoteLedger impl ─────────────────────────────────────────────────────────

impl VoteLedger for SqliteStore {
  type Error = Error;

  async fn cast_vote(
    &self,
    voter: UserId,
    target: VoteTarget,
    vote_type: VoteType,
  ) -> Result<CastOutcome> {
    self.require_live_target(target).await?;
    self.require_voter(voter).await?;

    let attempts = self.options.cast_attempts.max(1);
    for attempt in 1..=attempts {
      let result = self
        .conn
        .call(move |conn| match apply_cast(conn, voter, target, vote_type) {
          Ok(applied) => Ok(Attempt::Done(applied)),
          Err(e) if is_contention(&e) => Ok(Attempt::Contended(e.to_string())),
          Err(e) => Err(e.into()),
        })
        .await?;

      match result {
        Attempt::Done(applied) => {
          let outcome = applied.into_outcome()?;
          debug!(
            %voter,
            %target,
            %vote_type,
            attempt,
            outcome = ?outcome,
            "cast vote"
          );
          return Ok(outcome);
        }
        Attempt::Contended(reason) => {
          warn!(%voter, %target, attempt, attempts, %reason, "vote cast contended");
        }
      }
    }

    Err(Error::Conflict { target, attempts })
  }

  async fn vote_counts(&self, target: VoteTarget) -> Result<VoteCounts> {
    self.require_live_target(target).await?;
    self.tally(target).await
  }

  async fn vote_of(&self, voter: UserId, target: VoteTarget) -> Result<Option<Vote>> {
    self.require_live_target(target).await?;
    self.require_voter(voter).await?;

    let (post_id, reply_id) = encode_target(target);
    let mut votes = self
      .query_votes(
        format!(
          "SELECT {VOTE_COLUMNS} FROM votes
           WHERE user_id = ?1 AND post_id IS ?2 AND reply_id IS ?3"
        ),
        vec![
          Value::Integer(voter.get()),
          post_id.map_or(Value::Null, Value::Integer),
          reply_id.map_or(Value::Null, Value::Integer),
        ],
      )
      .await?;
    Ok(votes.pop())
  }

  async fn vote_history(
    &self,
    voter: UserId,
    filter: HistoryFilter,
    page: Page,
  ) -> Result<Vec<Vote>> {
    self.require_voter(voter).await?;

    let kind_clause = match filter {
      HistoryFilter::All => "",
      HistoryFilter::Posts => "AND post_id IS NOT NULL",
      HistoryFilter::Replies => "AND reply_id IS NOT NULL",
    };
    self
      .query_votes(
        format!(
          "SELECT {VOTE_COLUMNS} FROM votes
           WHERE user_id = ?1 {kind_clause}
           ORDER BY created_at DESC, vote_id DESC
           LIMIT ?2 OFFSET ?3"
        ),
        vec![
          Value::Integer(voter.get()),
          Value::Integer(sql_count(page.limit)),
          Value::Integer(sql_count(page.skip)),
        ],
      )
      .await
  }

  async fn votes_for(&self, target: VoteTarget, page: Page) -> Result<Vec<Vote>> {
    self.require_live_target(target).await?;

    let (post_id, reply_id) = encode_target(target);
    self
      .query_votes(
        format!(
          "SELECT {VOTE_COLUMNS} FROM votes
           WHERE post_id IS ?1 AND reply_id IS ?2
           ORDER BY created_at, vote_id
           LIMIT ?3 OFFSET ?4"
        ),
        vec![
          post_id.map_or(Value::Null, Value::Integer),
          reply_id.map_or(Value::Null, Value::Integer),
          Value::Integer(sql_count(page.limit)),
          Value::Integer(sql_count(page.skip)),
        ],
      )
      .await
  }

  async fn retract_vote(&self, id: VoteId) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM votes WHERE vote_id = ?1", rusqlite::params![id.get()])?)
      })
      .await?;

    if changed > 0 {
      debug!(vote_id = %id, "retracted vote");
    }
    Ok(changed > 0)
  }

  async fn purge_voter(&self, voter: UserId) -> Result<u64> {
    self.require_voter(voter).await?;
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM votes WHERE user_id = ?1", rusqlite::params![voter.get()])?)
      })
      .await?;

    debug!(%voter, removed = changed, "purged voter's votes");
    Ok(changed as u64)
  }

  async fn top_voted(
    &self,
    kind: TargetKind,
    within: Option<PostId>,
    since: Option<DateTime<Utc>>,
    limit: usize,
  ) -> Result<Vec<Tally>> {
    let within = match kind {
      TargetKind::Post => None,
      TargetKind::Reply => within,
    };
    if let Some(post_id) = within {
      self.require_live_target(VoteTarget::Post(post_id)).await?;
    }

    let mut tallies = self.tallies(kind, within, since).await?;
    rank_by_net(&mut tallies);
    tallies.truncate(limit);
    Ok(tallies)
  }

  async fn controversial(&self, min_total: u64, limit: usize) -> Result<Vec<Controversial>> {
    let mut tallies = self.tallies(TargetKind::Post, None, None).await?;
    tallies.extend(self.tallies(TargetKind::Reply, None, None).await?);
    Ok(select_controversial(tallies, min_total, limit))
  }

  async fn voting_stats(&self) -> Result<VotingStats> {
    let counts: [i64; 6] = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT
             COUNT(*),
             COALESCE(SUM(vote_type = 'upvote'), 0),
             COALESCE(SUM(vote_type = 'downvote'), 0),
             COUNT(DISTINCT user_id),
             COUNT(DISTINCT post_id),
             COUNT(DISTINCT reply_id)
           FROM votes",
          [],
          |row| {
            Ok([
              row.get(0)?,
              row.get(1)?,
              row.get(2)?,
              row.get(3)?,
              row.get(4)?,
              row.get(5)?,
            ])
          },
        )?)
      })
      .await?;

    let [total, up, down, voters, posts, replies] = counts.map(|n| n as u64);
    Ok(VotingStats {
      total_votes:        total,
      upvotes:            up,
      downvotes:          down,
      active_voters:      voters,
      posts_with_votes:   posts,
      replies_with_votes: replies,
    })
  }
}
