//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 with fixed microsecond precision and a `Z` suffix,
//! so they order correctly as strings. Payloads and metadata are compact
//! JSON. UUIDs are hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use kaiwa_core::{
  comment::Comment,
  history::{HistoryEntry, HistoryKind},
  notification::{Notification, NotificationKind, NotificationPayload},
  reaction::{Reaction, ReactionTarget, TargetType},
  user::User,
  watch_later::WatchLaterEntry,
};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

/// The current time at the precision the columns keep.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Parse a strum-backed discriminant column.
pub fn decode_enum<T: FromStr>(kind: &'static str, s: &str) -> Result<T> {
  s.parse().map_err(|_| {
    kaiwa_core::Error::UnknownDiscriminant { kind, value: s.to_owned() }.into()
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────
//
// Each `*_COLS` constant lists the columns its `Raw*::from_row` reads, in
// order.

pub const USER_COLS: &str = "user_id, name, avatar, created_at";

pub struct RawUser {
  pub user_id:    String,
  pub name:       String,
  pub avatar:     Option<String>,
  pub created_at: String,
}

impl RawUser {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      name:       row.get(1)?,
      avatar:     row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      name:       self.name,
      avatar:     self.avatar,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const COMMENT_COLS: &str =
  "comment_id, episode_id, user_id, parent_id, content, created_at, updated_at";

pub struct RawComment {
  pub comment_id: String,
  pub episode_id: String,
  pub user_id:    String,
  pub parent_id:  Option<String>,
  pub content:    String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawComment {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      comment_id: row.get(0)?,
      episode_id: row.get(1)?,
      user_id:    row.get(2)?,
      parent_id:  row.get(3)?,
      content:    row.get(4)?,
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
    })
  }

  pub fn into_comment(self) -> Result<Comment> {
    Ok(Comment {
      comment_id: decode_uuid(&self.comment_id)?,
      episode_id: decode_uuid(&self.episode_id)?,
      user_id:    decode_uuid(&self.user_id)?,
      parent_id:  self.parent_id.as_deref().map(decode_uuid).transpose()?,
      content:    self.content,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const REACTION_COLS: &str =
  "reaction_id, user_id, target_type, target_id, is_like, created_at, updated_at";

pub struct RawReaction {
  pub reaction_id: String,
  pub user_id:     String,
  pub target_type: String,
  pub target_id:   String,
  pub is_like:     bool,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawReaction {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reaction_id: row.get(0)?,
      user_id:     row.get(1)?,
      target_type: row.get(2)?,
      target_id:   row.get(3)?,
      is_like:     row.get(4)?,
      created_at:  row.get(5)?,
      updated_at:  row.get(6)?,
    })
  }

  pub fn into_reaction(self) -> Result<Reaction> {
    let target_type: TargetType = decode_enum("target type", &self.target_type)?;
    Ok(Reaction {
      reaction_id: decode_uuid(&self.reaction_id)?,
      user_id:     decode_uuid(&self.user_id)?,
      target:      ReactionTarget::from_parts(target_type, decode_uuid(&self.target_id)?),
      is_like:     self.is_like,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

pub const NOTIFICATION_COLS: &str =
  "notification_id, recipient_id, kind, payload, read_at, created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub kind:            String,
  pub payload:         String,
  pub read_at:         Option<String>,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      recipient_id:    row.get(1)?,
      kind:            row.get(2)?,
      payload:         row.get(3)?,
      read_at:         row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    let kind: NotificationKind = decode_enum("notification kind", &self.kind)?;
    let payload: NotificationPayload = serde_json::from_str(&self.payload)?;
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      recipient_id: decode_uuid(&self.recipient_id)?,
      kind,
      payload,
      read_at: self.read_at.as_deref().map(decode_dt).transpose()?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const HISTORY_COLS: &str =
  "history_id, user_id, episode_id, kind, metadata, created_at, updated_at";

pub struct RawHistory {
  pub history_id: String,
  pub user_id:    String,
  pub episode_id: String,
  pub kind:       String,
  pub metadata:   Option<String>,
  pub created_at: String,
  pub updated_at: String,
}

impl RawHistory {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      history_id: row.get(0)?,
      user_id:    row.get(1)?,
      episode_id: row.get(2)?,
      kind:       row.get(3)?,
      metadata:   row.get(4)?,
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<HistoryEntry> {
    let kind: HistoryKind = decode_enum("history kind", &self.kind)?;
    Ok(HistoryEntry {
      history_id: decode_uuid(&self.history_id)?,
      user_id: decode_uuid(&self.user_id)?,
      episode_id: decode_uuid(&self.episode_id)?,
      kind,
      metadata: self
        .metadata
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

pub const WATCH_LATER_COLS: &str = "watch_later_id, user_id, episode_id, created_at";

pub struct RawWatchLater {
  pub watch_later_id: String,
  pub user_id:        String,
  pub episode_id:     String,
  pub created_at:     String,
}

impl RawWatchLater {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      watch_later_id: row.get(0)?,
      user_id:        row.get(1)?,
      episode_id:     row.get(2)?,
      created_at:     row.get(3)?,
    })
  }

  pub fn into_entry(self) -> Result<WatchLaterEntry> {
    Ok(WatchLaterEntry {
      watch_later_id: decode_uuid(&self.watch_later_id)?,
      user_id:        decode_uuid(&self.user_id)?,
      episode_id:     decode_uuid(&self.episode_id)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}
