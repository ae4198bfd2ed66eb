//! Notifications: pull-based per-user inbox entries.
//!
//! The payload is serialised as a flat JSON object. Consuming UIs switch on
//! the `type` key and read the common keys `title`, `link`, `image`, `icon`
//! and `time`, so those names are part of the wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// The `kind` column value.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
  Reply,
  Like,
  NewEpisode,
}

/// Type-specific payload keys. The serde tag doubles as the payload `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationDetail {
  Reply {
    replier_name:     String,
    reply_content:    String,
    original_comment: String,
  },
  Like {
    liker_name:      String,
    is_like:         bool,
    comment_content: String,
  },
  #[serde(rename = "episode")]
  NewEpisode {
    duration: Option<String>,
  },
}

impl NotificationDetail {
  pub fn kind(&self) -> NotificationKind {
    match self {
      Self::Reply { .. } => NotificationKind::Reply,
      Self::Like { .. } => NotificationKind::Like,
      Self::NewEpisode { .. } => NotificationKind::NewEpisode,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
  pub title:  String,
  pub link:   String,
  pub image:  Option<String>,
  pub icon:   String,
  pub time:   DateTime<Utc>,
  #[serde(flatten)]
  pub detail: NotificationDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub recipient_id:    Uuid,
  pub kind:            NotificationKind,
  pub payload:         NotificationPayload,
  pub read_at:         Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}

impl Notification {
  pub fn is_read(&self) -> bool { self.read_at.is_some() }
}

/// Input to [`crate::store::EngagementStore::insert_notification`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
  pub recipient_id: Uuid,
  pub payload:      NotificationPayload,
}

impl NewNotification {
  pub fn kind(&self) -> NotificationKind { self.payload.detail.kind() }
}

/// A page of a user's inbox plus the total unread count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFeed {
  pub notifications: Vec<Notification>,
  pub unread_count:  u64,
}
