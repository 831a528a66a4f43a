//! Integration tests for `SqliteStore` against an in-memory database.

use agora_core::{
  ids::{ChannelId, PostId, ReplyId, UserId},
  reply::{NewReply, Reply},
  store::ReplyTree,
};

use crate::SqliteStore;

mod replies;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A store with one registered user and one post by them.
async fn seeded() -> (SqliteStore, UserId, PostId) {
  let s = store().await;
  let author = s.register_user("alice").await.unwrap();
  let post = s.register_post(ChannelId(1), author).await.unwrap();
  (s, author, post)
}

async fn reply(
  s: &SqliteStore,
  post: PostId,
  author: UserId,
  parent: Option<ReplyId>,
  content: &str,
) -> Reply {
  let input = NewReply::new(post, author, content);
  let input = match parent {
    Some(p) => input.under(p),
    None => input,
  };
  s.create_reply(input).await.unwrap()
}

fn ids(replies: &[Reply]) -> Vec<ReplyId> {
  replies.iter().map(|r| r.reply_id).collect()
}
