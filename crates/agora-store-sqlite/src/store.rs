//! [`SqliteStore`]: connection handling, identity rows, and the lookups the
//! reply tree and vote ledger share.

use std::{path::Path, time::Duration};

use agora_core::{
  Entity,
  ids::{ChannelId, PostId, ReplyId, UserId},
  reply::Reply,
  tree::ReplyForest,
  vote::{Vote, VoteCounts, VoteTarget},
};
use rusqlite::{OptionalExtension as _, types::Value};
use tracing::debug;

use crate::{
  Error, Result,
  encode::{
    REPLY_COLUMNS, encode_dt, encode_target, into_replies, into_votes, now, read_reply,
    read_vote,
  },
  schema::SCHEMA,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Tunables for a [`SqliteStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
  /// How many times a vote cast is attempted before a persistent conflict
  /// is reported as [`Error::Conflict`].
  pub cast_attempts: u32,
  /// How long a connection waits on another writer's lock.
  pub busy_timeout:  Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      cast_attempts: 3,
      busy_timeout:  Duration::from_secs(5),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Agora store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted. Separate
/// [`SqliteStore::open`] calls on the same file give independent connections
/// that contend through SQLite's locking.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:    tokio_rusqlite::Connection,
  pub(crate) options: StoreOptions,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, options };
    store.init().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self {
      conn,
      options: StoreOptions::default(),
    };
    store.init().await?;
    Ok(store)
  }

  pub fn options(&self) -> StoreOptions { self.options }

  async fn init(&self) -> Result<()> {
    let busy_timeout = self.options.busy_timeout;
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Identity rows ─────────────────────────────────────────────────────────

  /// Register a user. Accounts are owned by the caller's identity layer; the
  /// store keeps only what it needs to resolve ids.
  pub async fn register_user(&self, username: impl Into<String>) -> Result<UserId> {
    let username = username.into();
    let at_str = encode_dt(now());

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (username, created_at) VALUES (?1, ?2)",
          rusqlite::params![username, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    debug!(user_id = id, "registered user");
    Ok(UserId(id))
  }

  /// Register a post authored by `author_id` in `channel_id`.
  pub async fn register_post(&self, channel_id: ChannelId, author_id: UserId) -> Result<PostId> {
    if !self.user_exists(author_id).await? {
      return Err(Error::NotFound(Entity::Author));
    }

    let at_str = encode_dt(now());
    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (channel_id, author_id, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![channel_id.get(), author_id.get(), at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    debug!(post_id = id, %channel_id, %author_id, "registered post");
    Ok(PostId(id))
  }

  /// Soft-delete a post. Its replies and votes stay in place but the post
  /// stops accepting replies and votes.
  pub async fn soft_delete_post(&self, post_id: PostId) -> Result<()> {
    let at_str = encode_dt(now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE posts SET deleted_at = ?2 WHERE post_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![post_id.get(), at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::NotFound(Entity::Post));
    }
    debug!(%post_id, "soft-deleted post");
    Ok(())
  }

  // ── Shared lookups ────────────────────────────────────────────────────────

  pub(crate) async fn user_exists(&self, user_id: UserId) -> Result<bool> {
    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM users WHERE user_id = ?1",
              rusqlite::params![user_id.get()],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(exists)
  }

  /// Whether a post exists and is not soft-deleted.
  pub(crate) async fn post_is_live(&self, post_id: PostId) -> Result<bool> {
    let live = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM posts WHERE post_id = ?1 AND deleted_at IS NULL",
              rusqlite::params![post_id.get()],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;
    Ok(live)
  }

  /// Fail with `NotFound` unless the vote target exists and is live. A reply
  /// under a soft-deleted post fails with `NotFound(post)`.
  pub(crate) async fn require_live_target(&self, target: VoteTarget) -> Result<()> {
    match target {
      VoteTarget::Post(post_id) => {
        if !self.post_is_live(post_id).await? {
          return Err(Error::NotFound(Entity::Post));
        }
      }
      VoteTarget::Reply(reply_id) => {
        let post_live: Option<bool> = self
          .conn
          .call(move |conn| {
            Ok(
              conn
                .query_row(
                  "SELECT p.deleted_at IS NULL
                   FROM replies r
                   JOIN posts p ON p.post_id = r.post_id
                   WHERE r.reply_id = ?1 AND r.deleted_at IS NULL",
                  rusqlite::params![reply_id.get()],
                  |row| row.get(0),
                )
                .optional()?,
            )
          })
          .await?;
        match post_live {
          None => return Err(Error::NotFound(Entity::Reply)),
          Some(false) => return Err(Error::NotFound(Entity::Post)),
          Some(true) => {}
        }
      }
    }
    Ok(())
  }

  /// Run a reply `SELECT` whose column list is [`REPLY_COLUMNS`].
  pub(crate) async fn query_replies(&self, sql: String, params: Vec<Value>) -> Result<Vec<Reply>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), read_reply)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    into_replies(raws)
  }

  /// Run a vote `SELECT` whose column list is [`crate::encode::VOTE_COLUMNS`].
  pub(crate) async fn query_votes(&self, sql: String, params: Vec<Value>) -> Result<Vec<Vote>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), read_vote)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    into_votes(raws)
  }

  /// Every reply on `post_id`, soft-deleted ones included, as a forest.
  pub(crate) async fn post_forest(&self, post_id: PostId) -> Result<ReplyForest> {
    let replies = self
      .query_replies(
        format!("SELECT {REPLY_COLUMNS} FROM replies WHERE post_id = ?1"),
        vec![Value::Integer(post_id.get())],
      )
      .await?;
    Ok(ReplyForest::new(replies))
  }

  /// The forest of the post that `reply_id` belongs to.
  ///
  /// Fails with `NotFound(reply)` unless `reply_id` is a live reply, and with
  /// `NotFound(post)` when its post has been soft-deleted.
  pub(crate) async fn forest_around(&self, reply_id: ReplyId) -> Result<ReplyForest> {
    let replies = self
      .query_replies(
        format!(
          "SELECT {REPLY_COLUMNS} FROM replies
           WHERE post_id = (SELECT post_id FROM replies WHERE reply_id = ?1)"
        ),
        vec![Value::Integer(reply_id.get())],
      )
      .await?;

    let forest = ReplyForest::new(replies);
    let post_id = match forest.get(reply_id) {
      Some(r) if !r.is_deleted() => r.post_id,
      _ => return Err(Error::NotFound(Entity::Reply)),
    };
    if !self.post_is_live(post_id).await? {
      return Err(Error::NotFound(Entity::Post));
    }
    Ok(forest)
  }

  /// Tally the vote rows currently attached to `target`.
  pub(crate) async fn tally(&self, target: VoteTarget) -> Result<VoteCounts> {
    let (post_id, reply_id) = encode_target(target);

    let (up, down): (i64, i64) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT
             COALESCE(SUM(vote_type = 'upvote'), 0),
             COALESCE(SUM(vote_type = 'downvote'), 0)
           FROM votes
           WHERE post_id IS ?1 AND reply_id IS ?2",
          rusqlite::params![post_id, reply_id],
          |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
      })
      .await?;

    Ok(VoteCounts::from_tally(up as u64, down as u64))
  }
}
