use agora_core::{
  Entity, ValidationError,
  ids::{ChannelId, ReplyId},
  reply::{MAX_CONTENT_CHARS, MAX_REPLY_DEPTH, NewReply},
  store::{Page, ReplyTree, VoteLedger},
  vote::{VoteTarget, VoteType},
};

use super::*;
use crate::Error;

// ─── Create ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_root_reply() {
  let (s, author, post) = seeded().await;

  let r = s
    .create_reply(NewReply::new(post, author, "  first!  "))
    .await
    .unwrap();
  assert_eq!(r.content, "first!");
  assert_eq!(r.post_id, post);
  assert!(r.is_root());
  assert!(!r.is_edited());
  assert_eq!(s.depth(r.reply_id).await.unwrap(), 0);

  let fetched = s.get_reply(r.reply_id).await.unwrap().unwrap();
  assert_eq!(fetched, r);
}

#[tokio::test]
async fn create_rejects_bad_content() {
  let (s, author, post) = seeded().await;

  let err = s
    .create_reply(NewReply::new(post, author, " \n\t "))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::EmptyContent)));

  let long = "x".repeat(MAX_CONTENT_CHARS + 1);
  let err = s
    .create_reply(NewReply::new(post, author, long))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Validation(ValidationError::ContentTooLong { .. })
  ));

  // Exactly at the limit is fine, and length is counted in characters.
  let at_limit = "é".repeat(MAX_CONTENT_CHARS);
  s.create_reply(NewReply::new(post, author, at_limit))
    .await
    .unwrap();
}

#[tokio::test]
async fn create_requires_live_post_and_known_author() {
  let (s, author, post) = seeded().await;

  let err = s
    .create_reply(NewReply::new(PostId(999), author, "hi"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Post)));

  let err = s
    .create_reply(NewReply::new(post, UserId(999), "hi"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Author)));

  s.soft_delete_post(post).await.unwrap();
  let err = s
    .create_reply(NewReply::new(post, author, "hi"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Post)));
}

#[tokio::test]
async fn content_is_checked_before_post() {
  let (s, author, _) = seeded().await;
  let err = s
    .create_reply(NewReply::new(PostId(999), author, ""))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::EmptyContent)));
}

#[tokio::test]
async fn parent_must_be_live_and_on_same_post() {
  let (s, author, post) = seeded().await;
  let other_post = s.register_post(ChannelId(2), author).await.unwrap();
  let elsewhere = reply(&s, other_post, author, None, "elsewhere").await;
  let doomed = reply(&s, post, author, None, "doomed").await;
  s.soft_delete_reply(doomed.reply_id).await.unwrap();

  for parent in [ReplyId(999), elsewhere.reply_id, doomed.reply_id] {
    let err = s
      .create_reply(NewReply::new(post, author, "child").under(parent))
      .await
      .unwrap_err();
    assert!(
      matches!(err, Error::NotFound(Entity::Parent)),
      "parent {parent}: {err}"
    );
  }
}

// ─── Depth ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn depth_is_parent_depth_plus_one() {
  let (s, author, post) = seeded().await;
  let a = reply(&s, post, author, None, "a").await;
  let b = reply(&s, post, author, Some(a.reply_id), "b").await;
  let c = reply(&s, post, author, Some(b.reply_id), "c").await;
  let d = reply(&s, post, author, Some(a.reply_id), "d").await;

  for r in [&a, &b, &c, &d] {
    let depth = s.depth(r.reply_id).await.unwrap();
    let expected = match r.parent_id {
      Some(p) => s.depth(p).await.unwrap() + 1,
      None => 0,
    };
    assert_eq!(depth, expected, "reply {}", r.reply_id);
  }
}

#[tokio::test]
async fn max_depth_boundary() {
  let (s, author, post) = seeded().await;

  // Depths 0 through 8.
  let mut chain = vec![reply(&s, post, author, None, "d0").await];
  for d in 1..MAX_REPLY_DEPTH {
    let parent = chain.last().unwrap().reply_id;
    chain.push(reply(&s, post, author, Some(parent), &format!("d{d}")).await);
  }
  let depth_8 = chain.last().unwrap().reply_id;
  assert_eq!(s.depth(depth_8).await.unwrap(), 8);

  // Under depth 8 succeeds at depth 9.
  let depth_9 = reply(&s, post, author, Some(depth_8), "d9").await;
  assert_eq!(s.depth(depth_9.reply_id).await.unwrap(), MAX_REPLY_DEPTH);
  let view = s.view_reply(depth_9.reply_id).await.unwrap().unwrap();
  assert!(!view.can_reply_to);

  // Under depth 9 fails.
  let err = s
    .create_reply(NewReply::new(post, author, "too deep").under(depth_9.reply_id))
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Validation(ValidationError::MaxDepthExceeded { parent_depth: 9 })
  ));
}

// ─── Update / delete ─────────────────────────────────────────────────────────

#[tokio::test]
async fn update_advances_updated_at() {
  let (s, author, post) = seeded().await;
  let r = reply(&s, post, author, None, "draft").await;

  let edited = s
    .update_reply(r.reply_id, " final ".into())
    .await
    .unwrap();
  assert_eq!(edited.content, "final");
  assert_eq!(edited.created_at, r.created_at);
  assert!(edited.updated_at > r.updated_at);
  assert!(edited.is_edited());

  let fetched = s.get_reply(r.reply_id).await.unwrap().unwrap();
  assert_eq!(fetched, edited);
}

#[tokio::test]
async fn update_rejects_empty_and_deleted() {
  let (s, author, post) = seeded().await;
  let r = reply(&s, post, author, None, "text").await;

  let err = s.update_reply(r.reply_id, "   ".into()).await.unwrap_err();
  assert!(matches!(err, Error::Validation(ValidationError::EmptyContent)));

  s.soft_delete_reply(r.reply_id).await.unwrap();
  let err = s.update_reply(r.reply_id, "new".into()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Reply)));
}

#[tokio::test]
async fn soft_delete_hides_reply_once() {
  let (s, author, post) = seeded().await;
  let r = reply(&s, post, author, None, "bye").await;

  s.soft_delete_reply(r.reply_id).await.unwrap();
  assert!(s.get_reply(r.reply_id).await.unwrap().is_none());
  assert!(s.view_reply(r.reply_id).await.unwrap().is_none());

  let err = s.soft_delete_reply(r.reply_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Reply)));
  let err = s.soft_delete_reply(ReplyId(999)).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Reply)));
}

#[tokio::test]
async fn bulk_soft_delete_counts_changed_rows() {
  let (s, author, post) = seeded().await;
  let a = reply(&s, post, author, None, "a").await;
  let b = reply(&s, post, author, None, "b").await;
  let c = reply(&s, post, author, None, "c").await;
  s.soft_delete_reply(b.reply_id).await.unwrap();

  let changed = s
    .bulk_soft_delete(vec![a.reply_id, b.reply_id, ReplyId(999)])
    .await
    .unwrap();
  assert_eq!(changed, 1);
  assert_eq!(s.bulk_soft_delete(Vec::new()).await.unwrap(), 0);

  let left = s.list_by_post(post, Page::default()).await.unwrap();
  assert_eq!(ids(&left), vec![c.reply_id]);
}

#[tokio::test]
async fn deleted_parent_keeps_tree_edges() {
  let (s, author, post) = seeded().await;
  let a = reply(&s, post, author, None, "A").await;
  let b = reply(&s, post, author, Some(a.reply_id), "B").await;
  assert_eq!(s.depth(a.reply_id).await.unwrap(), 0);
  assert_eq!(s.depth(b.reply_id).await.unwrap(), 1);

  s.soft_delete_reply(a.reply_id).await.unwrap();

  let listed = s.list_replies(post, Page::default(), false).await.unwrap();
  assert_eq!(ids(&listed), vec![b.reply_id]);

  let ancestors = s.ancestors(b.reply_id).await.unwrap();
  assert_eq!(ids(&ancestors), vec![a.reply_id]);
  assert!(ancestors[0].is_deleted());
  assert_eq!(ancestors[0].content, "A");
  assert_eq!(s.depth(b.reply_id).await.unwrap(), 1);
  assert_eq!(s.thread_root(b.reply_id).await.unwrap().reply_id, a.reply_id);
}

// ─── Navigation ──────────────────────────────────────────────────────────────

/// ```text
/// a
/// ├── b
/// │   └── d
/// └── c
/// e
/// ```
async fn sample_tree(s: &SqliteStore, author: UserId, post: PostId) -> [Reply; 5] {
  let a = reply(s, post, author, None, "a").await;
  let b = reply(s, post, author, Some(a.reply_id), "b").await;
  let c = reply(s, post, author, Some(a.reply_id), "c").await;
  let e = reply(s, post, author, None, "e").await;
  let d = reply(s, post, author, Some(b.reply_id), "d").await;
  [a, b, c, d, e]
}

#[tokio::test]
async fn ancestors_and_thread_root() {
  let (s, author, post) = seeded().await;
  let [a, b, _, d, e] = sample_tree(&s, author, post).await;

  let ancestors = s.ancestors(d.reply_id).await.unwrap();
  assert_eq!(ids(&ancestors), vec![b.reply_id, a.reply_id]);
  assert!(s.ancestors(a.reply_id).await.unwrap().is_empty());

  let root = s.thread_root(d.reply_id).await.unwrap();
  assert_eq!(root.reply_id, a.reply_id);
  assert!(root.parent_id.is_none());
  assert_eq!(s.thread_root(e.reply_id).await.unwrap().reply_id, e.reply_id);

  let in_thread = s.descendants(root.reply_id).await.unwrap();
  assert!(ids(&in_thread).contains(&d.reply_id));
}

#[tokio::test]
async fn is_ancestor_of_matches_ancestors() {
  let (s, author, post) = seeded().await;
  let [a, b, c, d, e] = sample_tree(&s, author, post).await;

  assert!(s.is_ancestor_of(a.reply_id, d.reply_id).await.unwrap());
  assert!(s.is_ancestor_of(b.reply_id, d.reply_id).await.unwrap());
  assert!(!s.is_ancestor_of(c.reply_id, d.reply_id).await.unwrap());
  assert!(!s.is_ancestor_of(e.reply_id, d.reply_id).await.unwrap());
  assert!(!s.is_ancestor_of(d.reply_id, a.reply_id).await.unwrap());
  assert!(!s.is_ancestor_of(d.reply_id, d.reply_id).await.unwrap());
}

#[tokio::test]
async fn descendants_are_preorder_and_skip_deleted() {
  let (s, author, post) = seeded().await;
  let [a, b, c, d, _] = sample_tree(&s, author, post).await;

  let all = s.descendants(a.reply_id).await.unwrap();
  assert_eq!(ids(&all), vec![b.reply_id, d.reply_id, c.reply_id]);

  // Calling twice gives the same answer.
  let again = s.descendants(a.reply_id).await.unwrap();
  assert_eq!(ids(&again), ids(&all));

  // d stays reachable through its deleted parent.
  s.soft_delete_reply(b.reply_id).await.unwrap();
  let live = s.descendants(a.reply_id).await.unwrap();
  assert_eq!(ids(&live), vec![d.reply_id, c.reply_id]);
}

#[tokio::test]
async fn siblings_exclude_self() {
  let (s, author, post) = seeded().await;
  let [a, b, c, d, e] = sample_tree(&s, author, post).await;

  assert_eq!(ids(&s.siblings(b.reply_id).await.unwrap()), vec![c.reply_id]);
  assert_eq!(ids(&s.siblings(a.reply_id).await.unwrap()), vec![e.reply_id]);
  assert!(s.siblings(d.reply_id).await.unwrap().is_empty());

  s.soft_delete_reply(c.reply_id).await.unwrap();
  assert!(s.siblings(b.reply_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn navigation_from_deleted_reply_is_not_found() {
  let (s, author, post) = seeded().await;
  let [_, b, ..] = sample_tree(&s, author, post).await;
  s.soft_delete_reply(b.reply_id).await.unwrap();

  let err = s.ancestors(b.reply_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Reply)));
  let err = s.depth(ReplyId(999)).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Reply)));
  let err = s.reply_stats(b.reply_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Reply)));
}

#[tokio::test]
async fn navigation_under_deleted_post_is_not_found() {
  let (s, author, post) = seeded().await;
  let [a, b, ..] = sample_tree(&s, author, post).await;
  s.soft_delete_post(post).await.unwrap();

  let err = s.ancestors(b.reply_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Post)));
  let err = s.thread_of(a.reply_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Post)));
  let err = s.is_ancestor_of(a.reply_id, b.reply_id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Post)));
  assert!(s.view_reply(b.reply_id).await.unwrap().is_none());
}

#[tokio::test]
async fn children_are_paginated() {
  let (s, author, post) = seeded().await;
  let root = reply(&s, post, author, None, "root").await;
  let mut kids = Vec::new();
  for i in 0..5 {
    kids.push(reply(&s, post, author, Some(root.reply_id), &format!("kid {i}")).await.reply_id);
  }

  let all = s.children(root.reply_id, Page::default()).await.unwrap();
  assert_eq!(ids(&all), kids);

  let page = s.children(root.reply_id, Page::new(1, 2)).await.unwrap();
  assert_eq!(ids(&page), kids[1..3].to_vec());
}

#[tokio::test]
async fn thread_of_is_chronological() {
  let (s, author, post) = seeded().await;
  let [a, b, c, d, e] = sample_tree(&s, author, post).await;

  let thread = s.thread_of(d.reply_id).await.unwrap();
  assert_eq!(ids(&thread), vec![a.reply_id, b.reply_id, c.reply_id, d.reply_id]);

  let lone = s.thread_of(e.reply_id).await.unwrap();
  assert_eq!(ids(&lone), vec![e.reply_id]);
}

// ─── Listings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn threaded_listing_is_preorder() {
  let (s, author, post) = seeded().await;
  let [a, b, c, d, e] = sample_tree(&s, author, post).await;

  let flat = s.list_replies(post, Page::default(), false).await.unwrap();
  assert_eq!(
    ids(&flat),
    vec![a.reply_id, b.reply_id, c.reply_id, e.reply_id, d.reply_id]
  );

  let threaded = s.list_replies(post, Page::default(), true).await.unwrap();
  assert_eq!(
    ids(&threaded),
    vec![a.reply_id, b.reply_id, d.reply_id, c.reply_id, e.reply_id]
  );

  let page = s.list_by_post_threaded(post, Page::new(2, 2)).await.unwrap();
  assert_eq!(ids(&page), vec![d.reply_id, c.reply_id]);
}

#[tokio::test]
async fn threaded_listing_drops_orphans_of_deleted_parent() {
  let (s, author, post) = seeded().await;
  let [a, b, c, _, e] = sample_tree(&s, author, post).await;
  s.soft_delete_reply(b.reply_id).await.unwrap();

  let threaded = s.list_by_post_threaded(post, Page::default()).await.unwrap();
  assert_eq!(ids(&threaded), vec![a.reply_id, c.reply_id, e.reply_id]);
}

#[tokio::test]
async fn listing_a_deleted_post_is_not_found() {
  let (s, _, post) = seeded().await;
  s.soft_delete_post(post).await.unwrap();

  let err = s.list_by_post(post, Page::default()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Post)));
  let err = s.count_replies(post).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Post)));
}

#[tokio::test]
async fn count_search_and_author_listings() {
  let (s, alice, post) = seeded().await;
  let bob = s.register_user("bob").await.unwrap();

  let r1 = reply(&s, post, alice, None, "Rust is great").await;
  let r2 = reply(&s, post, bob, None, "I prefer RUST, honestly").await;
  let r3 = reply(&s, post, alice, Some(r2.reply_id), "100% agreed_").await;
  reply(&s, post, bob, None, "unrelated").await;

  assert_eq!(s.count_replies(post).await.unwrap(), 4);

  let hits = s.search_replies(post, "rust", Page::default()).await.unwrap();
  assert_eq!(ids(&hits), vec![r1.reply_id, r2.reply_id]);

  // Wildcards in the term are literal.
  let hits = s.search_replies(post, "0%", Page::default()).await.unwrap();
  assert_eq!(ids(&hits), vec![r3.reply_id]);
  let hits = s.search_replies(post, "d_", Page::default()).await.unwrap();
  assert_eq!(ids(&hits), vec![r3.reply_id]);

  let by_alice = s.replies_by_author(alice, Page::default()).await.unwrap();
  assert_eq!(ids(&by_alice), vec![r3.reply_id, r1.reply_id]);

  let err = s
    .replies_by_author(UserId(999), Page::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(Entity::Author)));
}

#[tokio::test]
async fn recent_replies_span_live_posts() {
  let (s, author, post) = seeded().await;
  let other = s.register_post(ChannelId(7), author).await.unwrap();

  let a = reply(&s, post, author, None, "a").await;
  let b = reply(&s, other, author, None, "b").await;
  let c = reply(&s, post, author, None, "c").await;

  let recent = s.recent_replies(2).await.unwrap();
  assert_eq!(ids(&recent), vec![c.reply_id, b.reply_id]);

  s.soft_delete_post(other).await.unwrap();
  let recent = s.recent_replies(10).await.unwrap();
  assert_eq!(ids(&recent), vec![c.reply_id, a.reply_id]);
}

// ─── View / stats ────────────────────────────────────────────────────────────

#[tokio::test]
async fn view_and_stats_include_votes() {
  let (s, alice, post) = seeded().await;
  let bob = s.register_user("bob").await.unwrap();
  let [a, b, _, d, _] = sample_tree(&s, alice, post).await;

  s.cast_vote(alice, VoteTarget::Reply(a.reply_id), VoteType::Upvote)
    .await
    .unwrap();
  s.cast_vote(bob, VoteTarget::Reply(a.reply_id), VoteType::Downvote)
    .await
    .unwrap();
  s.soft_delete_reply(d.reply_id).await.unwrap();

  let view = s.view_reply(a.reply_id).await.unwrap().unwrap();
  assert_eq!(view.depth, 0);
  assert!(view.can_reply_to);
  assert!(!view.is_edited);
  assert_eq!(view.votes.total, 2);
  assert_eq!(view.votes.net, 0);

  let stats = s.reply_stats(a.reply_id).await.unwrap();
  assert_eq!(stats.depth, 0);
  assert_eq!(stats.children_count, 2);
  assert_eq!(stats.descendant_count, 2);
  assert_eq!(stats.total_votes, 2);

  let stats = s.reply_stats(b.reply_id).await.unwrap();
  assert_eq!(stats.depth, 1);
  assert_eq!(stats.children_count, 0);
}
