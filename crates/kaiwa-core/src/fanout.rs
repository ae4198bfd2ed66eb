//! Notification fan-out: decides whether a mutation notifies anyone, and
//! builds the payload when it does.
//!
//! These functions are pure. Delivery (persisting the notification) is done
//! by the engagement service as a best-effort side effect.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
  comment::Comment,
  format::snippet,
  notification::{NewNotification, NotificationDetail, NotificationPayload},
  reaction::ReactionTransition,
  user::User,
};

pub const REPLY_CONTENT_CHARS: usize = 100;
pub const ORIGINAL_COMMENT_CHARS: usize = 80;
pub const LIKED_COMMENT_CHARS: usize = 100;

/// Builds the `link` value of a payload.
#[derive(Debug, Clone)]
pub struct Links {
  base: String,
}

impl Links {
  pub fn new(base: impl Into<String>) -> Self {
    Self { base: base.into().trim_end_matches('/').to_owned() }
  }

  pub fn episode(&self, episode_id: Uuid) -> String {
    format!("{}/{episode_id}", self.base)
  }
}

impl Default for Links {
  fn default() -> Self { Self::new("/episodes") }
}

/// Notify the parent's author that `replier` answered them.
///
/// Returns `None` for self-replies.
pub fn on_reply(
  links: &Links,
  parent: &Comment,
  reply: &Comment,
  replier: &User,
) -> Option<NewNotification> {
  if parent.user_id == replier.user_id {
    debug!(comment = %parent.comment_id, "self-reply, no notification");
    return None;
  }

  Some(NewNotification {
    recipient_id: parent.user_id,
    payload:      NotificationPayload {
      title:  format!("{} replied to your comment", replier.name),
      link:   links.episode(parent.episode_id),
      image:  replier.avatar.clone(),
      icon:   "message-circle".to_owned(),
      time:   reply.created_at,
      detail: NotificationDetail::Reply {
        replier_name:     replier.name.clone(),
        reply_content:    snippet(&reply.content, REPLY_CONTENT_CHARS),
        original_comment: snippet(&parent.content, ORIGINAL_COMMENT_CHARS),
      },
    },
  })
}

/// Notify the comment's author about a like or dislike.
///
/// Returns `None` for removals and for reactions on one's own comment.
pub fn on_reaction(
  links: &Links,
  comment: &Comment,
  reactor: &User,
  is_like: bool,
  transition: ReactionTransition,
  at: DateTime<Utc>,
) -> Option<NewNotification> {
  if !transition.may_notify() {
    return None;
  }
  if comment.user_id == reactor.user_id {
    debug!(comment = %comment.comment_id, "self-reaction, no notification");
    return None;
  }

  let verb = if is_like { "liked" } else { "disliked" };
  Some(NewNotification {
    recipient_id: comment.user_id,
    payload:      NotificationPayload {
      title:  format!("{} {verb} your comment", reactor.name),
      link:   links.episode(comment.episode_id),
      image:  reactor.avatar.clone(),
      icon:   if is_like { "thumbs-up" } else { "thumbs-down" }.to_owned(),
      time:   at,
      detail: NotificationDetail::Like {
        liker_name: reactor.name.clone(),
        is_like,
        comment_content: snippet(&comment.content, LIKED_COMMENT_CHARS),
      },
    },
  })
}

/// A newly published episode, announced to interested users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeAnnouncement {
  pub episode_id:   Uuid,
  pub title:        String,
  pub thumbnail:    Option<String>,
  /// Display duration, e.g. `"23:40"`.
  pub duration:     Option<String>,
  pub published_at: DateTime<Utc>,
}

/// One `new_episode` notification per recipient.
pub fn on_new_episode(
  links: &Links,
  episode: &EpisodeAnnouncement,
  recipients: &[Uuid],
) -> Vec<NewNotification> {
  recipients
    .iter()
    .map(|&recipient_id| NewNotification {
      recipient_id,
      payload: NotificationPayload {
        title:  format!("New episode added: {}", episode.title),
        link:   links.episode(episode.episode_id),
        image:  episode.thumbnail.clone(),
        icon:   "film".to_owned(),
        time:   episode.published_at,
        detail: NotificationDetail::NewEpisode { duration: episode.duration.clone() },
      },
    })
    .collect()
}
