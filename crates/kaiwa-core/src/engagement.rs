//! Engagement service: write-path orchestration over an
//! [`EngagementStore`].
//!
//! Each mutation runs inline within the calling request: the primary write
//! first, then notification fan-out and history recording. The side effects
//! are best-effort; their failures are logged and never undo or fail the
//! primary write.

use std::{collections::HashSet, sync::Arc};

use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error,
  comment::{Comment, CommentCreated, NewComment, normalize_content},
  fanout::{self, EpisodeAnnouncement, Links},
  history::{
    self, DEFAULT_ACTIVITY_WINDOW_SECS, HistoryEntry, HistoryKind, NewHistoryEntry,
  },
  notification::{NewNotification, NotificationFeed},
  reaction::{ReactionResult, ReactionTarget, ReactionTransition},
  store::{EngagementStore, Page},
  tree::{self, CommentNode, DEFAULT_MAX_DEPTH, TreeOptions},
  watch_later::WatchLaterEntry,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Tunables, deserialised from the `[engagement]` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
  /// Levels of the comment tree rendered eagerly.
  pub max_tree_depth:       usize,
  /// Coalescing window of [`Engagement::record_activity`], in seconds.
  pub activity_window_secs: i64,
  /// Prefix of notification links.
  pub link_base:            String,
  /// Default feed page size.
  pub page_size:            usize,
}

impl Default for EngagementConfig {
  fn default() -> Self {
    Self {
      max_tree_depth:       DEFAULT_MAX_DEPTH,
      activity_window_secs: DEFAULT_ACTIVITY_WINDOW_SECS,
      link_base:            "/episodes".to_owned(),
      page_size:            Page::default().limit,
    }
  }
}

/// Whether a first like is also written to the reactor's history.
///
/// Both reaction entry points share the toggle; only the page entry point
/// records history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LikeHistory {
  #[default]
  Record,
  Skip,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Engagement<S> {
  store:  Arc<S>,
  config: EngagementConfig,
  links:  Links,
}

impl<S> Clone for Engagement<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      config: self.config.clone(),
      links:  self.links.clone(),
    }
  }
}

fn require(actor: Option<Uuid>) -> crate::Result<Uuid> {
  actor.ok_or(Error::Unauthenticated)
}

impl<S: EngagementStore> Engagement<S> {
  pub fn new(store: Arc<S>, config: EngagementConfig) -> Self {
    let links = Links::new(config.link_base.clone());
    Self { store, config, links }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &EngagementConfig { &self.config }

  /// A page of the configured size at `offset`, or an explicit limit.
  pub fn page(&self, limit: Option<usize>, offset: Option<usize>) -> Page {
    Page {
      limit:  limit.unwrap_or(self.config.page_size),
      offset: offset.unwrap_or(0),
    }
  }

  // ── Comments ──────────────────────────────────────────────────────────

  /// Create a top-level comment, or a reply when `parent_id` is given.
  pub async fn post_comment(
    &self,
    actor: Option<Uuid>,
    episode_id: Uuid,
    content: String,
    parent_id: Option<Uuid>,
  ) -> Result<Comment, S::Error> {
    let user_id = require(actor)?;
    let content = normalize_content(&content)?;

    let comment = self
      .store
      .insert_comment(NewComment { episode_id, user_id, parent_id, content })
      .await?;
    info!(comment = %comment.comment_id, episode = %episode_id, "comment created");

    match self.load_event(&comment).await {
      Ok(event) => {
        self.fan_out_reply(&event).await;
        self.record_comment_history(&event).await;
      }
      Err(e) => warn!(comment = %comment.comment_id, error = %e, "skipping comment side effects"),
    }

    Ok(comment)
  }

  async fn load_event(&self, comment: &Comment) -> Result<CommentCreated, S::Error> {
    let parent = match comment.parent_id {
      Some(pid) => self.store.get_comment(pid).await?,
      None => None,
    };
    Ok(CommentCreated { comment: comment.clone(), parent })
  }

  async fn fan_out_reply(&self, event: &CommentCreated) {
    let Some(parent) = &event.parent else { return };
    let replier = match self.store.get_user(event.comment.user_id).await {
      Ok(Some(u)) => u,
      Ok(None) => {
        warn!(user = %event.comment.user_id, "replier not found, no notification");
        return;
      }
      Err(e) => {
        warn!(error = %e, "failed to load replier");
        return;
      }
    };
    if let Some(n) = fanout::on_reply(&self.links, parent, &event.comment, &replier) {
      self.deliver(n).await;
    }
  }

  async fn record_comment_history(&self, event: &CommentCreated) {
    let c = &event.comment;
    let (kind, metadata) = match &event.parent {
      Some(parent) => {
        let author = match self.store.get_user(parent.user_id).await {
          Ok(u) => u,
          Err(e) => {
            warn!(error = %e, "failed to load parent author");
            None
          }
        };
        let name = author.as_ref().map(|u| u.name.as_str());
        (HistoryKind::Reply, history::reply_metadata(c, Some(parent), name))
      }
      // The parent vanished between insert and now; still a reply.
      None if c.is_reply() => (HistoryKind::Reply, history::reply_metadata(c, None, None)),
      None => (HistoryKind::Comment, history::comment_metadata(c)),
    };

    let entry = NewHistoryEntry {
      user_id: c.user_id,
      episode_id: c.episode_id,
      kind,
      metadata: Some(metadata),
    };
    if let Err(e) = self.store.insert_history(entry).await {
      warn!(comment = %c.comment_id, error = %e, "failed to record comment history");
    }
  }

  pub async fn get_comment(&self, id: Uuid) -> Result<Comment, S::Error> {
    self
      .store
      .get_comment(id)
      .await?
      .ok_or_else(|| Error::CommentNotFound(id).into())
  }

  pub async fn edit_comment(
    &self,
    actor: Option<Uuid>,
    id: Uuid,
    content: String,
  ) -> Result<Comment, S::Error> {
    let user_id = require(actor)?;
    let existing = self.get_comment(id).await?;
    if existing.user_id != user_id {
      return Err(Error::NotAuthor { user: user_id, comment: id }.into());
    }
    let content = normalize_content(&content)?;
    self.store.update_comment(id, user_id, content).await
  }

  /// Returns the number of comments removed (the comment plus descendants).
  pub async fn delete_comment(
    &self,
    actor: Option<Uuid>,
    id: Uuid,
  ) -> Result<usize, S::Error> {
    let user_id = require(actor)?;
    let removed = self.store.delete_comment(id, user_id).await?;
    info!(comment = %id, removed, "comment deleted");
    Ok(removed)
  }

  // ── Reactions ─────────────────────────────────────────────────────────

  /// Toggle a like (`is_like = true`) or dislike on a comment.
  pub async fn react(
    &self,
    actor: Option<Uuid>,
    comment_id: Uuid,
    is_like: bool,
    history: LikeHistory,
  ) -> Result<ReactionResult, S::Error> {
    let user_id = require(actor)?;
    let comment = self.get_comment(comment_id).await?;

    let change = self
      .store
      .toggle_reaction(ReactionTarget::Comment(comment_id), user_id, is_like)
      .await?;
    debug!(comment = %comment_id, transition = ?change.transition, "reaction toggled");

    let notify_owner = change.transition.may_notify() && comment.user_id != user_id;
    let record_like = history == LikeHistory::Record
      && change.transition == ReactionTransition::Inserted
      && is_like;

    if notify_owner || record_like {
      self
        .after_reaction(&comment, user_id, is_like, change.transition, notify_owner, record_like)
        .await;
    }

    Ok(ReactionResult {
      likes: change.likes,
      dislikes: change.dislikes,
      viewer_reaction: change.viewer_reaction,
      notify_owner,
    })
  }

  async fn after_reaction(
    &self,
    comment: &Comment,
    reactor_id: Uuid,
    is_like: bool,
    transition: ReactionTransition,
    notify_owner: bool,
    record_like: bool,
  ) {
    if notify_owner {
      match self.store.get_user(reactor_id).await {
        Ok(Some(reactor)) => {
          if let Some(n) =
            fanout::on_reaction(&self.links, comment, &reactor, is_like, transition, Utc::now())
          {
            self.deliver(n).await;
          }
        }
        Ok(None) => warn!(user = %reactor_id, "reactor not found, no notification"),
        Err(e) => warn!(error = %e, "failed to load reactor"),
      }
    }

    if record_like {
      let owner = match self.store.get_user(comment.user_id).await {
        Ok(u) => u,
        Err(e) => {
          warn!(error = %e, "failed to load comment owner");
          None
        }
      };
      let entry = NewHistoryEntry {
        user_id:    reactor_id,
        episode_id: comment.episode_id,
        kind:       HistoryKind::Like,
        metadata:   Some(history::like_metadata(
          comment,
          owner.as_ref().map(|u| u.name.as_str()),
        )),
      };
      if let Err(e) = self.store.insert_history(entry).await {
        warn!(comment = %comment.comment_id, error = %e, "failed to record like history");
      }
    }
  }

  // ── Read path ─────────────────────────────────────────────────────────

  /// Assemble an episode's comment tree as seen by `viewer`.
  pub async fn comment_tree(
    &self,
    episode_id: Uuid,
    viewer: Option<Uuid>,
  ) -> Result<Vec<CommentNode>, S::Error> {
    let comments = self.store.list_comments(episode_id).await?;
    let reactions = self.store.list_episode_reactions(episode_id).await?;

    let author_ids: Vec<Uuid> = comments
      .iter()
      .map(|c| c.user_id)
      .collect::<HashSet<_>>()
      .into_iter()
      .collect();
    let authors = self
      .store
      .get_users(&author_ids)
      .await?
      .into_iter()
      .map(|u| (u.user_id, u))
      .collect();

    let opts = TreeOptions { max_depth: self.config.max_tree_depth, now: Utc::now() };
    Ok(tree::assemble(comments, &reactions, &authors, viewer, opts))
  }

  // ── History ───────────────────────────────────────────────────────────

  /// Record that `actor` opened an episode. Repeat views touch one row.
  pub async fn record_view(
    &self,
    actor: Option<Uuid>,
    episode_id: Uuid,
  ) -> Result<HistoryEntry, S::Error> {
    let user_id = require(actor)?;
    self.store.upsert_view(user_id, episode_id).await
  }

  /// Generic activity entry point with a coalescing window.
  ///
  /// Returns the stored entry and whether it was merged into an existing
  /// one. Views always go through the view upsert.
  pub async fn record_activity(
    &self,
    actor: Option<Uuid>,
    episode_id: Uuid,
    kind: HistoryKind,
    metadata: Option<Value>,
  ) -> Result<(HistoryEntry, bool), S::Error> {
    let user_id = require(actor)?;
    if kind == HistoryKind::View {
      let entry = self.store.upsert_view(user_id, episode_id).await?;
      let merged = entry.updated_at != entry.created_at;
      return Ok((entry, merged));
    }

    let since = Utc::now() - Duration::seconds(self.config.activity_window_secs);
    self
      .store
      .coalesce_history(NewHistoryEntry { user_id, episode_id, kind, metadata }, since)
      .await
  }

  pub async fn history(
    &self,
    actor: Option<Uuid>,
    page: Page,
  ) -> Result<Vec<HistoryEntry>, S::Error> {
    let user_id = require(actor)?;
    self.store.list_history(user_id, page).await
  }

  pub async fn clear_history(&self, actor: Option<Uuid>) -> Result<usize, S::Error> {
    let user_id = require(actor)?;
    self.store.clear_history(user_id).await
  }

  // ── Notifications ─────────────────────────────────────────────────────

  async fn deliver(&self, n: NewNotification) {
    let recipient = n.recipient_id;
    let kind = n.kind();
    match self.store.insert_notification(n).await {
      Ok(stored) => debug!(notification = %stored.notification_id, %recipient, %kind, "notification stored"),
      Err(e) => warn!(%recipient, %kind, error = %e, "failed to store notification"),
    }
  }

  /// Notify each recipient of a new episode. Returns how many notifications
  /// were attempted.
  pub async fn announce_episode(
    &self,
    episode: &EpisodeAnnouncement,
    recipients: &[Uuid],
  ) -> usize {
    let batch = fanout::on_new_episode(&self.links, episode, recipients);
    let n = batch.len();
    for notification in batch {
      self.deliver(notification).await;
    }
    info!(episode = %episode.episode_id, recipients = n, "episode announced");
    n
  }

  pub async fn notifications(
    &self,
    actor: Option<Uuid>,
    page: Page,
  ) -> Result<NotificationFeed, S::Error> {
    let user_id = require(actor)?;
    let notifications = self.store.list_notifications(user_id, page).await?;
    let unread_count = self.store.unread_count(user_id).await?;
    Ok(NotificationFeed { notifications, unread_count })
  }

  pub async fn mark_all_read(&self, actor: Option<Uuid>) -> Result<usize, S::Error> {
    let user_id = require(actor)?;
    self.store.mark_all_read(user_id).await
  }

  pub async fn delete_notification(
    &self,
    actor: Option<Uuid>,
    id: Uuid,
  ) -> Result<(), S::Error> {
    let user_id = require(actor)?;
    self.store.delete_notification(user_id, id).await
  }

  pub async fn clear_notifications(&self, actor: Option<Uuid>) -> Result<usize, S::Error> {
    let user_id = require(actor)?;
    self.store.clear_notifications(user_id).await
  }

  // ── Watch later ───────────────────────────────────────────────────────

  /// Save an episode for later. Idempotent; the flag reports whether a new
  /// entry was created.
  pub async fn add_to_watch_later(
    &self,
    actor: Option<Uuid>,
    episode_id: Uuid,
  ) -> Result<(WatchLaterEntry, bool), S::Error> {
    let user_id = require(actor)?;
    let (entry, created) = self.store.add_watch_later(user_id, episode_id).await?;
    debug!(user = %user_id, episode = %episode_id, created, "watch later saved");
    Ok((entry, created))
  }

  /// Removing an episode that was never saved is not an error.
  pub async fn remove_from_watch_later(
    &self,
    actor: Option<Uuid>,
    episode_id: Uuid,
  ) -> Result<bool, S::Error> {
    let user_id = require(actor)?;
    self.store.remove_watch_later(user_id, episode_id).await
  }

  pub async fn watch_later(
    &self,
    actor: Option<Uuid>,
    page: Page,
  ) -> Result<Vec<WatchLaterEntry>, S::Error> {
    let user_id = require(actor)?;
    self.store.list_watch_later(user_id, page).await
  }
}
