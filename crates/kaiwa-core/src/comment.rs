//! Comments: episode discussion entries and their replies.
//!
//! Replies are ordinary comments with a `parent_id`. Storage holds an
//! unbounded tree per top-level comment; display depth is bounded by
//! [`crate::tree`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Maximum comment length in characters.
pub const MAX_CONTENT_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
  pub comment_id: Uuid,
  pub episode_id: Uuid,
  /// Author.
  pub user_id:    Uuid,
  /// `None` for a top-level comment.
  pub parent_id:  Option<Uuid>,
  pub content:    String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Comment {
  pub fn is_reply(&self) -> bool { self.parent_id.is_some() }
}

/// Input to [`crate::store::EngagementStore::insert_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
  pub episode_id: Uuid,
  pub user_id:    Uuid,
  pub parent_id:  Option<Uuid>,
  pub content:    String,
}

/// Trim surrounding whitespace, then reject empty or oversized content.
/// Returns the text to store.
pub fn normalize_content(content: &str) -> Result<String> {
  let trimmed = content.trim();
  if trimmed.is_empty() {
    return Err(Error::EmptyContent);
  }
  let len = trimmed.chars().count();
  if len > MAX_CONTENT_CHARS {
    return Err(Error::ContentTooLong { len, max: MAX_CONTENT_CHARS });
  }
  Ok(trimmed.to_owned())
}

/// Emitted by the engagement service after a comment is persisted; consumed by
/// notification fan-out and the history recorder.
#[derive(Debug, Clone)]
pub struct CommentCreated {
  pub comment: Comment,
  /// The comment replied to, when `comment` is a reply.
  pub parent:  Option<Comment>,
}
