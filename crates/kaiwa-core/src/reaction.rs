//! Reactions: one like or dislike per user per target.
//!
//! The toggle is tri-state: a first click inserts, the same click again
//! removes, the opposite click switches direction in place. [`decide`] is the
//! single source of that rule; backends apply it inside their read-modify-write
//! critical section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Polymorphic reaction target. Only comments can be reacted to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "target_type", content = "target_id", rename_all = "snake_case")]
pub enum ReactionTarget {
  Comment(Uuid),
}

/// The `target_type` column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TargetType {
  Comment,
}

impl ReactionTarget {
  pub fn target_type(&self) -> TargetType {
    match self {
      Self::Comment(_) => TargetType::Comment,
    }
  }

  pub fn id(&self) -> Uuid {
    match self {
      Self::Comment(id) => *id,
    }
  }

  pub fn from_parts(target_type: TargetType, id: Uuid) -> Self {
    match target_type {
      TargetType::Comment => Self::Comment(id),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
  pub reaction_id: Uuid,
  pub user_id:     Uuid,
  pub target:      ReactionTarget,
  /// `true` = like, `false` = dislike.
  pub is_like:     bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

// ─── Toggle rule ─────────────────────────────────────────────────────────────

/// What a reaction click did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionTransition {
  /// No row existed; one was inserted.
  Inserted,
  /// A row with the same direction existed; it was deleted.
  Removed,
  /// A row with the opposite direction existed; it was flipped.
  Switched,
}

impl ReactionTransition {
  /// Only inserts and switches may notify the target owner.
  pub fn may_notify(self) -> bool { !matches!(self, Self::Removed) }
}

/// Apply the tri-state toggle to the caller's existing reaction.
pub fn decide(existing: Option<bool>, requested: bool) -> ReactionTransition {
  match existing {
    None => ReactionTransition::Inserted,
    Some(current) if current == requested => ReactionTransition::Removed,
    Some(_) => ReactionTransition::Switched,
  }
}

/// Result of a backend toggle, with counts recomputed after the write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionChange {
  pub transition:      ReactionTransition,
  pub likes:           u64,
  pub dislikes:        u64,
  /// The caller's reaction after the write; `None` after a removal.
  pub viewer_reaction: Option<bool>,
}

/// Outcome of [`crate::engagement::Engagement::react`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResult {
  pub likes:           u64,
  pub dislikes:        u64,
  pub viewer_reaction: Option<bool>,
  /// Whether this click qualified for an owner notification.
  pub notify_owner:    bool,
}

/// Like and dislike counts for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
  pub likes:    u64,
  pub dislikes: u64,
}

impl ReactionCounts {
  pub fn add(&mut self, is_like: bool) {
    if is_like {
      self.likes += 1;
    } else {
      self.dislikes += 1;
    }
  }
}
