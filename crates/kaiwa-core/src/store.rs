//! The `EngagementStore` trait.
//!
//! Implemented by storage backends (e.g. `kaiwa-store-sqlite`). The
//! engagement service and the HTTP layer depend on this abstraction, not on
//! any concrete backend.
//!
//! Backends own three guarantees the service cannot provide on its own:
//! deleting a comment removes its whole subtree and their reactions in one
//! transaction, a reaction toggle is an atomic read-modify-write per
//! `(user, target)`, and view history is an upsert.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Classify,
  comment::{Comment, NewComment},
  history::{HistoryEntry, NewHistoryEntry},
  notification::{NewNotification, Notification},
  reaction::{Reaction, ReactionChange, ReactionCounts, ReactionTarget},
  user::{NewUser, User},
  watch_later::WatchLaterEntry,
};

/// Offset pagination for feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
  pub limit:  usize,
  pub offset: usize,
}

impl Default for Page {
  fn default() -> Self { Self { limit: 20, offset: 0 } }
}

/// Abstraction over a comment/engagement storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait EngagementStore: Send + Sync {
  type Error: std::error::Error
    + Classify
    + From<crate::Error>
    + Send
    + Sync
    + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Fetch several users at once; unknown ids are skipped.
  fn get_users<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + 'a;

  /// Look up a user and their argon2 password hash by login name.
  fn find_credentials<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<(User, String)>, Self::Error>> + Send + 'a;

  // ── Comments ──────────────────────────────────────────────────────────

  /// Persist a comment.
  ///
  /// Fails with `ParentNotFound` if `parent_id` does not resolve, and with
  /// `ParentEpisodeMismatch` if it resolves to another episode's comment.
  fn insert_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  fn get_comment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Comment>, Self::Error>> + Send + '_;

  /// Replace the content of a comment authored by `author`.
  ///
  /// Fails with `CommentNotFound` or `NotAuthor`.
  fn update_comment(
    &self,
    id: Uuid,
    author: Uuid,
    content: String,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  /// Delete a comment authored by `author`, together with every descendant
  /// and every reaction on any of them. Returns the number of comments
  /// removed.
  fn delete_comment(
    &self,
    id: Uuid,
    author: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Every comment of an episode, at any depth.
  fn list_comments(
    &self,
    episode_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  // ── Reactions ─────────────────────────────────────────────────────────

  /// Apply the tri-state toggle ([`crate::reaction::decide`]) atomically and
  /// return the transition with recomputed counts.
  fn toggle_reaction(
    &self,
    target: ReactionTarget,
    user_id: Uuid,
    is_like: bool,
  ) -> impl Future<Output = Result<ReactionChange, Self::Error>> + Send + '_;

  fn reaction_counts(
    &self,
    target: ReactionTarget,
  ) -> impl Future<Output = Result<ReactionCounts, Self::Error>> + Send + '_;

  /// All reactions on the comments of an episode.
  fn list_episode_reactions(
    &self,
    episode_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Reaction>, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn insert_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first.
  fn list_notifications(
    &self,
    recipient: Uuid,
    page: Page,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn unread_count(
    &self,
    recipient: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Set `read_at` on every unread notification; returns how many changed.
  fn mark_all_read(
    &self,
    recipient: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Fails with `NotificationNotFound` unless `id` belongs to `recipient`.
  fn delete_notification(
    &self,
    recipient: Uuid,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn clear_notifications(
    &self,
    recipient: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── History ───────────────────────────────────────────────────────────

  /// Unconditional insert.
  fn insert_history(
    &self,
    input: NewHistoryEntry,
  ) -> impl Future<Output = Result<HistoryEntry, Self::Error>> + Send + '_;

  /// Insert the view entry for `(user, episode)` or advance its
  /// `updated_at`.
  fn upsert_view(
    &self,
    user_id: Uuid,
    episode_id: Uuid,
  ) -> impl Future<Output = Result<HistoryEntry, Self::Error>> + Send + '_;

  /// If an entry with the same `(user, episode, kind)` was created at or
  /// after `since`, update it in place (replacing metadata only when new
  /// metadata is given) and return it with `true`. Otherwise insert and
  /// return `false`.
  fn coalesce_history(
    &self,
    input: NewHistoryEntry,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<(HistoryEntry, bool), Self::Error>> + Send + '_;

  /// Most recently touched first.
  fn list_history(
    &self,
    user_id: Uuid,
    page: Page,
  ) -> impl Future<Output = Result<Vec<HistoryEntry>, Self::Error>> + Send + '_;

  fn clear_history(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Watch later ───────────────────────────────────────────────────────

  /// Save an episode; saving it again returns the existing entry. The flag
  /// is `true` when a new entry was created.
  fn add_watch_later(
    &self,
    user_id: Uuid,
    episode_id: Uuid,
  ) -> impl Future<Output = Result<(WatchLaterEntry, bool), Self::Error>> + Send + '_;

  /// Returns whether an entry was removed.
  fn remove_watch_later(
    &self,
    user_id: Uuid,
    episode_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Most recently saved first.
  fn list_watch_later(
    &self,
    user_id: Uuid,
    page: Page,
  ) -> impl Future<Output = Result<Vec<WatchLaterEntry>, Self::Error>> + Send + '_;
}
