//! Activity history: a per-user log of views, comments, replies and likes.
//!
//! Two write paths exist. The dedicated paths used by the comment and
//! reaction operations always insert (views upsert). The generic activity
//! path coalesces repeats of the same `(user, episode, kind)` inside a
//! de-duplication window, for clients that re-report the same activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{comment::Comment, format::snippet};

/// Coalescing window of the generic activity path.
pub const DEFAULT_ACTIVITY_WINDOW_SECS: i64 = 5 * 60;

pub const COMMENT_CONTENT_CHARS: usize = 100;
pub const REPLIED_TO_CONTENT_CHARS: usize = 50;
pub const LIKED_CONTENT_CHARS: usize = 100;

/// Placeholder when a referenced author no longer exists.
pub const UNKNOWN_USER: &str = "user";

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
  /// Accepts `"watch"` from older clients.
  #[serde(alias = "watch")]
  #[strum(to_string = "view", serialize = "watch")]
  View,
  #[strum(to_string = "comment")]
  Comment,
  #[strum(to_string = "reply")]
  Reply,
  #[strum(to_string = "like")]
  Like,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub history_id: Uuid,
  pub user_id:    Uuid,
  pub episode_id: Uuid,
  pub kind:       HistoryKind,
  /// Kind-specific details; see the `*_metadata` constructors.
  pub metadata:   Option<Value>,
  pub created_at: DateTime<Utc>,
  /// Advanced by repeat views and by coalesced activity.
  pub updated_at: DateTime<Utc>,
}

/// Input to the history write methods of
/// [`crate::store::EngagementStore`].
#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
  pub user_id:    Uuid,
  pub episode_id: Uuid,
  pub kind:       HistoryKind,
  pub metadata:   Option<Value>,
}

// ─── Metadata ────────────────────────────────────────────────────────────────

pub fn comment_metadata(comment: &Comment) -> Value {
  json!({
    "comment_id": comment.comment_id,
    "content":    snippet(&comment.content, COMMENT_CONTENT_CHARS),
  })
}

/// `parent_author` is `None` when the parent's author cannot be resolved.
pub fn reply_metadata(
  reply: &Comment,
  parent: Option<&Comment>,
  parent_author: Option<&str>,
) -> Value {
  json!({
    "comment_id":         reply.comment_id,
    "content":            snippet(&reply.content, COMMENT_CONTENT_CHARS),
    "replied_to_user":    parent_author.unwrap_or(UNKNOWN_USER),
    "replied_to_content": parent
      .map(|p| snippet(&p.content, REPLIED_TO_CONTENT_CHARS))
      .unwrap_or_default(),
  })
}

pub fn like_metadata(comment: &Comment, owner: Option<&str>) -> Value {
  json!({
    "comment_id":      comment.comment_id,
    "comment_content": snippet(&comment.content, LIKED_CONTENT_CHARS),
    "comment_owner":   owner.unwrap_or(UNKNOWN_USER),
  })
}
