//! Read-side navigation over a post's replies.
//!
//! A [`ReplyForest`] is an arena of flat [`Reply`] records plus an explicit
//! `parent id → children` index built on construction. Every traversal walks
//! that index with a visited set, so a parent cycle in corrupted data ends a
//! walk early instead of looping forever.
//!
//! The forest is built fresh for every query and never mutates the records
//! it holds.

use std::{
  cmp::Ordering,
  collections::{HashMap, HashSet},
};

use crate::{ids::ReplyId, reply::Reply};

/// Creation order with ties broken by id: the order used by every listing.
pub fn chronological(a: &Reply, b: &Reply) -> Ordering {
  (a.created_at, a.reply_id).cmp(&(b.created_at, b.reply_id))
}

// ─── Forest ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ReplyForest {
  /// Sorted by [`chronological`].
  nodes:    Vec<Reply>,
  index:    HashMap<ReplyId, usize>,
  /// Keyed by `parent_id`; `None` holds the root-level replies. Each list is
  /// chronological because `nodes` is.
  children: HashMap<Option<ReplyId>, Vec<usize>>,
}

impl ReplyForest {
  /// Build a forest from the replies of a single post, in any order.
  pub fn new(mut replies: Vec<Reply>) -> Self {
    replies.sort_by(chronological);

    let index = replies
      .iter()
      .enumerate()
      .map(|(i, r)| (r.reply_id, i))
      .collect();

    let mut children: HashMap<Option<ReplyId>, Vec<usize>> = HashMap::new();
    for (i, r) in replies.iter().enumerate() {
      children.entry(r.parent_id).or_default().push(i);
    }

    Self { nodes: replies, index, children }
  }

  pub fn len(&self) -> usize { self.nodes.len() }

  pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

  pub fn contains(&self, id: ReplyId) -> bool { self.index.contains_key(&id) }

  pub fn get(&self, id: ReplyId) -> Option<&Reply> {
    self.index.get(&id).map(|&i| &self.nodes[i])
  }

  /// All replies, chronologically.
  pub fn iter(&self) -> impl Iterator<Item = &Reply> { self.nodes.iter() }

  pub fn parent(&self, id: ReplyId) -> Option<&Reply> {
    let parent_id = self.get(id)?.parent_id?;
    self.get(parent_id)
  }

  /// Root-level replies, chronologically.
  pub fn roots(&self) -> impl Iterator<Item = &Reply> {
    self.child_indices(None).iter().map(|&i| &self.nodes[i])
  }

  /// Direct children of `id`, chronologically.
  pub fn children(&self, id: ReplyId) -> impl Iterator<Item = &Reply> {
    self.child_indices(Some(id)).iter().map(|&i| &self.nodes[i])
  }

  /// Parent first, thread root last. Empty for a root or an unknown id.
  pub fn ancestors(&self, id: ReplyId) -> Ancestors<'_> {
    let mut seen = HashSet::new();
    let next = self.index.get(&id).and_then(|&start| {
      seen.insert(start);
      self.parent_index(start)
    });
    Ancestors { forest: self, next, seen }
  }

  /// Number of parent hops up to the thread root, or `None` for an unknown
  /// id.
  pub fn depth(&self, id: ReplyId) -> Option<u32> {
    if !self.contains(id) {
      return None;
    }
    Some(self.ancestors(id).count() as u32)
  }

  /// The ancestor with no parent; `id` itself when it is a root.
  pub fn thread_root(&self, id: ReplyId) -> Option<&Reply> {
    let start = self.get(id)?;
    Some(self.ancestors(id).last().unwrap_or(start))
  }

  /// Irreflexive: a reply is never its own ancestor.
  pub fn is_ancestor_of(&self, ancestor: ReplyId, of: ReplyId) -> bool {
    ancestor != of && self.ancestors(of).any(|r| r.reply_id == ancestor)
  }

  /// Every reply beneath `id`, depth-first, each node before its subtree.
  ///
  /// Each call returns a fresh iterator; nothing is carried between calls.
  pub fn descendants(&self, id: ReplyId) -> Preorder<'_> {
    match self.index.get(&id) {
      Some(&start) => Preorder::new(self, self.child_indices(Some(id)), Some(start)),
      None => Preorder::new(self, &[], None),
    }
  }

  /// Replies sharing `id`'s parent (or the other roots), excluding `id`.
  pub fn siblings(&self, id: ReplyId) -> Vec<&Reply> {
    let Some(reply) = self.get(id) else {
      return Vec::new();
    };
    self
      .child_indices(reply.parent_id)
      .iter()
      .map(|&i| &self.nodes[i])
      .filter(|r| r.reply_id != id)
      .collect()
  }

  /// The whole thread containing `id`: its root and every descendant of the
  /// root, chronologically.
  pub fn thread(&self, id: ReplyId) -> Vec<&Reply> {
    let Some(root) = self.thread_root(id) else {
      return Vec::new();
    };
    let mut thread: Vec<&Reply> = std::iter::once(root)
      .chain(self.descendants(root.reply_id))
      .collect();
    thread.sort_by(|a, b| chronological(a, b));
    thread
  }

  /// Pre-order flattening of every thread, roots chronologically: each reply
  /// is followed immediately by its entire subtree.
  ///
  /// Replies whose parent is not in the forest are unreachable and therefore
  /// left out.
  pub fn threaded(&self) -> Preorder<'_> {
    Preorder::new(self, self.child_indices(None), None)
  }

  fn child_indices(&self, parent: Option<ReplyId>) -> &[usize] {
    self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
  }

  fn parent_index(&self, idx: usize) -> Option<usize> {
    let parent_id = self.nodes[idx].parent_id?;
    self.index.get(&parent_id).copied()
  }
}

// ─── Iterators ───────────────────────────────────────────────────────────────

/// Walks parent pointers upward. See [`ReplyForest::ancestors`].
pub struct Ancestors<'f> {
  forest: &'f ReplyForest,
  next:   Option<usize>,
  seen:   HashSet<usize>,
}

impl<'f> Iterator for Ancestors<'f> {
  type Item = &'f Reply;

  fn next(&mut self) -> Option<Self::Item> {
    let idx = self.next.take()?;
    if !self.seen.insert(idx) {
      return None;
    }
    self.next = self
      .forest
      .parent_index(idx)
      .filter(|p| !self.seen.contains(p));
    Some(&self.forest.nodes[idx])
  }
}

/// Depth-first, pre-order walk over child lists.
pub struct Preorder<'f> {
  forest: &'f ReplyForest,
  stack:  Vec<usize>,
  seen:   HashSet<usize>,
}

impl<'f> Preorder<'f> {
  fn new(forest: &'f ReplyForest, start: &[usize], exclude: Option<usize>) -> Self {
    Self {
      forest,
      stack: start.iter().rev().copied().collect(),
      seen: exclude.into_iter().collect(),
    }
  }
}

impl<'f> Iterator for Preorder<'f> {
  type Item = &'f Reply;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(idx) = self.stack.pop() {
      if !self.seen.insert(idx) {
        continue;
      }
      let reply = &self.forest.nodes[idx];
      self.stack.extend(
        self
          .forest
          .child_indices(Some(reply.reply_id))
          .iter()
          .rev()
          .copied(),
      );
      return Some(reply);
    }
    None
  }
}
