//! [`ReplyTree`] for [`SqliteStore`].
//!
//! Writes are single statements. Navigation loads the affected post's
//! replies (soft-deleted ones included) and hands them to
//! [`agora_core::tree::ReplyForest`], so every answer is recomputed from the
//! rows present at call time.

use agora_core::{
  Entity, ValidationError,
  ids::{PostId, ReplyId, UserId},
  reply::{NewReply, Reply, ReplyStats, ReplyView, can_reply_to, normalize_content},
  store::{Page, ReplyTree},
  tree::ReplyForest,
  vote::VoteTarget,
};
use rusqlite::types::Value;
use tracing::debug;

use crate::{
  Error, Result, SqliteStore,
  encode::{REPLY_COLUMNS, advance, encode_dt, like_pattern, now, sql_count},
};

fn live<'a>(replies: impl IntoIterator<Item = &'a Reply>) -> Vec<Reply> {
  replies.into_iter().filter(|r| !r.is_deleted()).cloned().collect()
}

impl SqliteStore {
  async fn require_live_post(&self, post_id: PostId) -> Result<()> {
    if self.post_is_live(post_id).await? {
      Ok(())
    } else {
      Err(Error::NotFound(Entity::Post))
    }
  }

  /// The stored row for `id`, deleted or not.
  async fn reply_row(&self, id: ReplyId) -> Result<Option<Reply>> {
    let mut rows = self
      .query_replies(
        format!("SELECT {REPLY_COLUMNS} FROM replies WHERE reply_id = ?1"),
        vec![Value::Integer(id.get())],
      )
      .await?;
    Ok(rows.pop())
  }
}

// ─── ReplyTree impl ──────────────────────────────────────────────────────────

impl ReplyTree for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn create_reply(&self, input: NewReply) -> Result<Reply> {
    let content = normalize_content(&input.content)?;
    self.require_live_post(input.post_id).await?;
    if !self.user_exists(input.author_id).await? {
      return Err(Error::NotFound(Entity::Author));
    }

    if let Some(parent_id) = input.parent_id {
      let forest = self.post_forest(input.post_id).await?;
      let parent = forest
        .get(parent_id)
        .filter(|p| !p.is_deleted())
        .ok_or(Error::NotFound(Entity::Parent))?;
      let parent_depth = forest.depth(parent.reply_id).unwrap_or_default();
      if !can_reply_to(parent_depth) {
        return Err(ValidationError::MaxDepthExceeded { parent_depth }.into());
      }
    }

    let created_at = now();
    let at_str = encode_dt(created_at);
    let content_in = content.clone();
    let (post_id, author_id, parent_id) = (input.post_id, input.author_id, input.parent_id);

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO replies (post_id, author_id, content, parent_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
          rusqlite::params![
            post_id.get(),
            author_id.get(),
            content_in,
            parent_id.map(|p| p.get()),
            at_str,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    debug!(reply_id = id, %post_id, parent_id = ?parent_id.map(|p| p.get()), "created reply");

    Ok(Reply {
      reply_id: ReplyId(id),
      post_id,
      author_id,
      content,
      parent_id,
      created_at,
      updated_at: created_at,
      deleted_at: None,
    })
  }

  async fn update_reply(&self, id: ReplyId, content: String) -> Result<Reply> {
    let content = normalize_content(&content)?;
    let current = self
      .reply_row(id)
      .await?
      .filter(|r| !r.is_deleted())
      .ok_or(Error::NotFound(Entity::Reply))?;

    let updated_at = advance(current.updated_at);
    let at_str = encode_dt(updated_at);
    let content_in = content.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE replies SET content = ?2, updated_at = ?3
           WHERE reply_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id.get(), content_in, at_str],
        )?)
      })
      .await?;

    // Deleted between the read and the write.
    if changed == 0 {
      return Err(Error::NotFound(Entity::Reply));
    }

    debug!(reply_id = %id, "updated reply");
    Ok(Reply {
      content,
      updated_at,
      ..current
    })
  }

  async fn soft_delete_reply(&self, id: ReplyId) -> Result<()> {
    let at_str = encode_dt(now());
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE replies SET deleted_at = ?2 WHERE reply_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![id.get(), at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::NotFound(Entity::Reply));
    }
    debug!(reply_id = %id, "soft-deleted reply");
    Ok(())
  }

  async fn bulk_soft_delete(&self, ids: Vec<ReplyId>) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }

    let placeholders = (2..ids.len() + 2)
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let sql = format!(
      "UPDATE replies SET deleted_at = ?1
       WHERE deleted_at IS NULL AND reply_id IN ({placeholders})"
    );
    let params: Vec<Value> = std::iter::once(Value::Text(encode_dt(now())))
      .chain(ids.iter().map(|id| Value::Integer(id.get())))
      .collect();

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?))
      .await?;

    debug!(requested = ids.len(), changed, "bulk soft-deleted replies");
    Ok(changed)
  }

  // ── Single reply ──────────────────────────────────────────────────────────

  async fn get_reply(&self, id: ReplyId) -> Result<Option<Reply>> {
    Ok(self.reply_row(id).await?.filter(|r| !r.is_deleted()))
  }

  async fn view_reply(&self, id: ReplyId) -> Result<Option<ReplyView>> {
    let forest = match self.forest_around(id).await {
      Ok(forest) => forest,
      Err(Error::NotFound(_)) => return Ok(None),
      Err(e) => return Err(e),
    };
    let Some(reply) = forest.get(id).cloned() else {
      return Ok(None);
    };
    let depth = forest.depth(id).unwrap_or_default();
    let votes = self.tally(VoteTarget::Reply(id)).await?;
    Ok(Some(ReplyView::new(reply, depth, votes)))
  }

  async fn reply_stats(&self, id: ReplyId) -> Result<ReplyStats> {
    let forest = self.forest_around(id).await?;
    let depth = forest.depth(id).unwrap_or_default();
    let children_count = forest.children(id).filter(|r| !r.is_deleted()).count();
    let descendant_count = forest.descendants(id).filter(|r| !r.is_deleted()).count();
    let total_votes = self.tally(VoteTarget::Reply(id)).await?.total;

    Ok(ReplyStats {
      depth,
      children_count,
      descendant_count,
      total_votes,
    })
  }

  // ── Navigation ────────────────────────────────────────────────────────────

  async fn depth(&self, id: ReplyId) -> Result<u32> {
    let forest = self.forest_around(id).await?;
    Ok(forest.depth(id).unwrap_or_default())
  }

  async fn thread_root(&self, id: ReplyId) -> Result<Reply> {
    let forest = self.forest_around(id).await?;
    forest
      .thread_root(id)
      .cloned()
      .ok_or(Error::NotFound(Entity::Reply))
  }

  async fn ancestors(&self, id: ReplyId) -> Result<Vec<Reply>> {
    let forest = self.forest_around(id).await?;
    Ok(forest.ancestors(id).cloned().collect())
  }

  async fn descendants(&self, id: ReplyId) -> Result<Vec<Reply>> {
    let forest = self.forest_around(id).await?;
    Ok(live(forest.descendants(id)))
  }

  async fn siblings(&self, id: ReplyId) -> Result<Vec<Reply>> {
    let forest = self.forest_around(id).await?;
    Ok(live(forest.siblings(id)))
  }

  async fn is_ancestor_of(&self, ancestor: ReplyId, of: ReplyId) -> Result<bool> {
    let forest = self.forest_around(of).await?;
    Ok(forest.is_ancestor_of(ancestor, of))
  }

  async fn children(&self, id: ReplyId, page: Page) -> Result<Vec<Reply>> {
    let forest = self.forest_around(id).await?;
    Ok(page.slice(live(forest.children(id))))
  }

  async fn thread_of(&self, id: ReplyId) -> Result<Vec<Reply>> {
    let forest = self.forest_around(id).await?;
    Ok(live(forest.thread(id)))
  }

  // ── Listings ──────────────────────────────────────────────────────────────

  async fn list_by_post(&self, post_id: PostId, page: Page) -> Result<Vec<Reply>> {
    self.require_live_post(post_id).await?;
    self
      .query_replies(
        format!(
          "SELECT {REPLY_COLUMNS} FROM replies
           WHERE post_id = ?1 AND deleted_at IS NULL
           ORDER BY created_at, reply_id
           LIMIT ?2 OFFSET ?3"
        ),
        vec![
          Value::Integer(post_id.get()),
          Value::Integer(sql_count(page.limit)),
          Value::Integer(sql_count(page.skip)),
        ],
      )
      .await
  }

  async fn list_by_post_threaded(&self, post_id: PostId, page: Page) -> Result<Vec<Reply>> {
    self.require_live_post(post_id).await?;
    let replies = self
      .query_replies(
        format!(
          "SELECT {REPLY_COLUMNS} FROM replies
           WHERE post_id = ?1 AND deleted_at IS NULL"
        ),
        vec![Value::Integer(post_id.get())],
      )
      .await?;

    // Only live rows go in, so children of deleted replies are unreachable.
    let forest = ReplyForest::new(replies);
    Ok(page.slice(forest.threaded().cloned()))
  }

  async fn count_replies(&self, post_id: PostId) -> Result<u64> {
    self.require_live_post(post_id).await?;
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM replies WHERE post_id = ?1 AND deleted_at IS NULL",
          rusqlite::params![post_id.get()],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count as u64)
  }

  async fn replies_by_author(&self, author_id: UserId, page: Page) -> Result<Vec<Reply>> {
    if !self.user_exists(author_id).await? {
      return Err(Error::NotFound(Entity::Author));
    }
    self
      .query_replies(
        format!(
          "SELECT {REPLY_COLUMNS} FROM replies
           WHERE author_id = ?1 AND deleted_at IS NULL
           ORDER BY created_at DESC, reply_id DESC
           LIMIT ?2 OFFSET ?3"
        ),
        vec![
          Value::Integer(author_id.get()),
          Value::Integer(sql_count(page.limit)),
          Value::Integer(sql_count(page.skip)),
        ],
      )
      .await
  }

  async fn search_replies<'a>(
    &'a self,
    post_id: PostId,
    term: &'a str,
    page: Page,
  ) -> Result<Vec<Reply>> {
    self.require_live_post(post_id).await?;
    // SQLite's LIKE folds ASCII case only.
    self
      .query_replies(
        format!(
          "SELECT {REPLY_COLUMNS} FROM replies
           WHERE post_id = ?1 AND deleted_at IS NULL
             AND content LIKE ?2 ESCAPE '\\'
           ORDER BY created_at, reply_id
           LIMIT ?3 OFFSET ?4"
        ),
        vec![
          Value::Integer(post_id.get()),
          Value::Text(like_pattern(term.trim())),
          Value::Integer(sql_count(page.limit)),
          Value::Integer(sql_count(page.skip)),
        ],
      )
      .await
  }

  async fn recent_replies(&self, limit: usize) -> Result<Vec<Reply>> {
    self
      .query_replies(
        format!(
          "SELECT {REPLY_COLUMNS} FROM replies r
           WHERE r.deleted_at IS NULL
             AND EXISTS (
               SELECT 1 FROM posts p
               WHERE p.post_id = r.post_id AND p.deleted_at IS NULL
             )
           ORDER BY r.created_at DESC, r.reply_id DESC
           LIMIT ?1"
        ),
        vec![Value::Integer(sql_count(limit))],
      )
      .await
  }
}
