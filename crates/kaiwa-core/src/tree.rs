//! Comment tree assembly for display.
//!
//! Comments arrive as a flat list (one query per episode). The assembler
//! indexes them into an arena keyed by parent id and materialises subtrees
//! down to a fixed depth. Deeper replies stay in storage and remain
//! individually retrievable; they are only left out of this view.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  comment::Comment,
  format::relative_time,
  reaction::{Reaction, ReactionCounts},
  user::{Author, User},
};

/// Levels rendered, counting top-level comments as level 1.
pub const DEFAULT_MAX_DEPTH: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNode {
  pub id:               Uuid,
  pub user_id:          Uuid,
  /// `None` if the author no longer exists.
  pub author:           Option<Author>,
  pub content:          String,
  pub created_at:       DateTime<Utc>,
  /// Relative time, e.g. `"3 hours ago"`.
  pub date:             String,
  pub likes:            u64,
  pub dislikes:         u64,
  /// The viewer's own reaction: like, dislike, or none.
  pub user_interaction: Option<bool>,
  pub children:         Vec<CommentNode>,
}

#[derive(Debug, Clone, Copy)]
pub struct TreeOptions {
  pub max_depth: usize,
  /// Reference point for [`CommentNode::date`].
  pub now:       DateTime<Utc>,
}

impl Default for TreeOptions {
  fn default() -> Self {
    Self { max_depth: DEFAULT_MAX_DEPTH, now: Utc::now() }
  }
}

struct Arena<'a> {
  comments: Vec<Comment>,
  children: HashMap<Uuid, Vec<usize>>,
  counts:   HashMap<Uuid, ReactionCounts>,
  viewer:   HashMap<Uuid, bool>,
  authors:  &'a HashMap<Uuid, User>,
  opts:     TreeOptions,
}

impl Arena<'_> {
  fn node(&self, idx: usize, depth: usize) -> CommentNode {
    let c = &self.comments[idx];
    let counts = self.counts.get(&c.comment_id).copied().unwrap_or_default();

    let children = if depth < self.opts.max_depth {
      self
        .children
        .get(&c.comment_id)
        .map(|kids| kids.iter().map(|&k| self.node(k, depth + 1)).collect())
        .unwrap_or_default()
    } else {
      Vec::new()
    };

    CommentNode {
      id: c.comment_id,
      user_id: c.user_id,
      author: self.authors.get(&c.user_id).map(Author::from),
      content: c.content.clone(),
      created_at: c.created_at,
      date: relative_time(c.created_at, self.opts.now),
      likes: counts.likes,
      dislikes: counts.dislikes,
      user_interaction: self.viewer.get(&c.comment_id).copied(),
      children,
    }
  }
}

/// Build the display tree for one episode's comments.
///
/// Top-level comments are ordered newest-first, replies oldest-first.
/// Reactions on comments outside `comments` are ignored, as are replies
/// whose parent is missing from `comments`.
pub fn assemble(
  mut comments: Vec<Comment>,
  reactions: &[Reaction],
  authors: &HashMap<Uuid, User>,
  viewer: Option<Uuid>,
  opts: TreeOptions,
) -> Vec<CommentNode> {
  if opts.max_depth == 0 {
    return Vec::new();
  }

  comments.sort_by(|a, b| {
    a.created_at
      .cmp(&b.created_at)
      .then_with(|| a.comment_id.cmp(&b.comment_id))
  });

  let mut counts: HashMap<Uuid, ReactionCounts> = HashMap::new();
  let mut viewer_reactions = HashMap::new();
  for r in reactions {
    let id = r.target.id();
    counts.entry(id).or_default().add(r.is_like);
    if Some(r.user_id) == viewer {
      viewer_reactions.insert(id, r.is_like);
    }
  }

  let mut roots = Vec::new();
  let mut children: HashMap<Uuid, Vec<usize>> = HashMap::new();
  for (idx, c) in comments.iter().enumerate() {
    match c.parent_id {
      None => roots.push(idx),
      Some(parent) => children.entry(parent).or_default().push(idx),
    }
  }
  roots.reverse();

  let arena = Arena {
    comments,
    children,
    counts,
    viewer: viewer_reactions,
    authors,
    opts,
  };

  roots.into_iter().map(|idx| arena.node(idx, 1)).collect()
}
