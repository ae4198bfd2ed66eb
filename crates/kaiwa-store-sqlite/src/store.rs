//! [`SqliteStore`]: the SQLite implementation of [`EngagementStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{
  Connection, OptionalExtension as _, TransactionBehavior, params, params_from_iter,
};
use tracing::debug;
use uuid::Uuid;

use kaiwa_core::{
  comment::{Comment, NewComment},
  history::{HistoryEntry, HistoryKind, NewHistoryEntry},
  notification::{NewNotification, Notification},
  reaction::{
    Reaction, ReactionChange, ReactionCounts, ReactionTarget, ReactionTransition,
    TargetType, decide,
  },
  store::{EngagementStore, Page},
  user::{NewUser, User},
  watch_later::WatchLaterEntry,
};

use crate::{
  Error, Result,
  encode::{
    COMMENT_COLS, HISTORY_COLS, NOTIFICATION_COLS, REACTION_COLS, RawComment, RawHistory,
    RawNotification, RawReaction, RawUser, RawWatchLater, USER_COLS, WATCH_LATER_COLS,
    encode_dt, encode_uuid, now,
  },
  schema::SCHEMA,
};

/// Ids of a comment and every descendant, root first.
const SUBTREE_SQL: &str = "
  WITH RECURSIVE subtree(id) AS (
    SELECT ?1
    UNION ALL
    SELECT c.comment_id FROM comments c JOIN subtree s ON c.parent_id = s.id
  )
  SELECT id FROM subtree";

const COUNTS_SQL: &str = "
  SELECT COALESCE(SUM(is_like), 0), COALESCE(SUM(1 - is_like), 0)
  FROM reactions
  WHERE target_type = ?1 AND target_id = ?2";

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _) if f.code == rusqlite::ErrorCode::ConstraintViolation
  )
}

/// Outer result: database failure. Inner result: domain rejection, which
/// leaves the caller's transaction to roll back on drop.
fn check_author(conn: &Connection, id: Uuid, author: Uuid) -> rusqlite::Result<Result<()>> {
  let owner: Option<String> = conn
    .query_row(
      "SELECT user_id FROM comments WHERE comment_id = ?1",
      params![encode_uuid(id)],
      |r| r.get(0),
    )
    .optional()?;

  Ok(match owner {
    None => Err(kaiwa_core::Error::CommentNotFound(id).into()),
    Some(o) if o == encode_uuid(author) => Ok(()),
    Some(_) => Err(kaiwa_core::Error::NotAuthor { user: author, comment: id }.into()),
  })
}

fn counts(conn: &Connection, target_type: &str, target_id: &str) -> rusqlite::Result<(u64, u64)> {
  let (likes, dislikes): (i64, i64) = conn.query_row(
    COUNTS_SQL,
    params![target_type, target_id],
    |r| Ok((r.get(0)?, r.get(1)?)),
  )?;
  Ok((likes.max(0) as u64, dislikes.max(0) as u64))
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Engagement storage backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── EngagementStore impl ────────────────────────────────────────────────────

impl EngagementStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:    Uuid::new_v4(),
      name:       input.name,
      avatar:     input.avatar,
      created_at: now(),
    };

    let id_str = encode_uuid(user.user_id);
    let name   = user.name.clone();
    let avatar = user.avatar.clone();
    let hash   = input.password_hash;
    let at_str = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (user_id, name, avatar, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![id_str, name, avatar, hash, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLS} FROM users WHERE user_id = ?1"),
              params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawUser> = self
      .conn
      .call(move |conn| {
        let marks = vec!["?"; id_strs.len()].join(", ");
        let mut stmt =
          conn.prepare(&format!("SELECT {USER_COLS} FROM users WHERE user_id IN ({marks})"))?;
        let rows = stmt
          .query_map(params_from_iter(id_strs.iter()), RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawUser::into_user).collect()
  }

  async fn find_credentials(&self, name: &str) -> Result<Option<(User, String)>> {
    let name = name.to_owned();

    let raw: Option<(RawUser, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLS}, password_hash FROM users WHERE name = ?1"),
              params![name],
              |row| Ok((RawUser::from_row(row)?, row.get(4)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(user, hash)| Ok((user.into_user()?, hash)))
      .transpose()
  }

  // ── Comments ──────────────────────────────────────────────────────────────

  async fn insert_comment(&self, input: NewComment) -> Result<Comment> {
    let at = now();
    let comment = Comment {
      comment_id: Uuid::new_v4(),
      episode_id: input.episode_id,
      user_id:    input.user_id,
      parent_id:  input.parent_id,
      content:    input.content,
      created_at: at,
      updated_at: at,
    };

    let id_str      = encode_uuid(comment.comment_id);
    let episode_str = encode_uuid(comment.episode_id);
    let user_str    = encode_uuid(comment.user_id);
    let parent_id   = comment.parent_id;
    let content     = comment.content.clone();
    let at_str      = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let parent_str = parent_id.map(encode_uuid);
        if let (Some(pid), Some(pstr)) = (parent_id, parent_str.as_deref()) {
          let parent_episode: Option<String> = tx
            .query_row(
              "SELECT episode_id FROM comments WHERE comment_id = ?1",
              params![pstr],
              |r| r.get(0),
            )
            .optional()?;
          match parent_episode {
            None => return Ok(Err(Error::Core(kaiwa_core::Error::ParentNotFound(pid)))),
            Some(e) if e != episode_str => {
              return Ok(Err(Error::Core(kaiwa_core::Error::ParentEpisodeMismatch {
                parent: pid,
              })));
            }
            Some(_) => {}
          }
        }

        tx.execute(
          &format!("INSERT INTO comments ({COMMENT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"),
          params![id_str, episode_str, user_str, parent_str, content, at_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await??;

    Ok(comment)
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawComment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {COMMENT_COLS} FROM comments WHERE comment_id = ?1"),
              params![id_str],
              RawComment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawComment::into_comment).transpose()
  }

  async fn update_comment(&self, id: Uuid, author: Uuid, content: String) -> Result<Comment> {
    let id_str = encode_uuid(id);
    let at_str = encode_dt(now());

    let raw: RawComment = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Err(e) = check_author(&tx, id, author)? {
          return Ok(Err(e));
        }

        tx.execute(
          "UPDATE comments SET content = ?2, updated_at = ?3 WHERE comment_id = ?1",
          params![id_str, content, at_str],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {COMMENT_COLS} FROM comments WHERE comment_id = ?1"),
          params![id_str],
          RawComment::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_comment()
  }

  async fn delete_comment(&self, id: Uuid, author: Uuid) -> Result<usize> {
    let target_type = TargetType::Comment.to_string();

    let removed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Err(e) = check_author(&tx, id, author)? {
          return Ok(Err(e));
        }

        let root = encode_uuid(id);
        let subtree: Vec<String> = {
          let mut stmt = tx.prepare(SUBTREE_SQL)?;
          stmt
            .query_map(params![root], |r| r.get(0))?
            .collect::<rusqlite::Result<_>>()?
        };

        for cid in &subtree {
          tx.execute(
            "DELETE FROM reactions WHERE target_type = ?1 AND target_id = ?2",
            params![target_type, cid],
          )?;
        }
        // Descendants follow through ON DELETE CASCADE.
        tx.execute("DELETE FROM comments WHERE comment_id = ?1", params![root])?;
        tx.commit()?;
        Ok(Ok(subtree.len()))
      })
      .await??;

    debug!(comment = %id, removed, "comment subtree deleted");
    Ok(removed)
  }

  async fn list_comments(&self, episode_id: Uuid) -> Result<Vec<Comment>> {
    let episode_str = encode_uuid(episode_id);

    let raws: Vec<RawComment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {COMMENT_COLS} FROM comments
           WHERE episode_id = ?1
           ORDER BY created_at, comment_id"
        ))?;
        let rows = stmt
          .query_map(params![episode_str], RawComment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawComment::into_comment).collect()
  }

  // ── Reactions ─────────────────────────────────────────────────────────────

  async fn toggle_reaction(
    &self,
    target: ReactionTarget,
    user_id: Uuid,
    is_like: bool,
  ) -> Result<ReactionChange> {
    let target_id   = target.id();
    let target_type = target.target_type().to_string();
    let target_str  = encode_uuid(target_id);
    let user_str    = encode_uuid(user_id);
    let new_id      = encode_uuid(Uuid::new_v4());
    let at_str      = encode_dt(now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<bool> = tx
          .query_row(
            "SELECT is_like FROM reactions
             WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
            params![user_str, target_type, target_str],
            |r| r.get(0),
          )
          .optional()?;

        let transition = decide(existing, is_like);
        match transition {
          ReactionTransition::Inserted => {
            let inserted = tx.execute(
              &format!(
                "INSERT INTO reactions ({REACTION_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"
              ),
              params![new_id, user_str, target_type, target_str, is_like, at_str],
            );
            match inserted {
              Err(e) if is_unique_violation(&e) => {
                return Ok(Err(Error::Core(kaiwa_core::Error::ReactionConflict(target_id))));
              }
              other => {
                other?;
              }
            }
          }
          ReactionTransition::Removed => {
            tx.execute(
              "DELETE FROM reactions
               WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
              params![user_str, target_type, target_str],
            )?;
          }
          ReactionTransition::Switched => {
            tx.execute(
              "UPDATE reactions SET is_like = ?4, updated_at = ?5
               WHERE user_id = ?1 AND target_type = ?2 AND target_id = ?3",
              params![user_str, target_type, target_str, is_like, at_str],
            )?;
          }
        }

        let (likes, dislikes) = counts(&tx, &target_type, &target_str)?;
        tx.commit()?;

        let viewer_reaction = match transition {
          ReactionTransition::Removed => None,
          ReactionTransition::Inserted | ReactionTransition::Switched => Some(is_like),
        };
        Ok(Ok(ReactionChange { transition, likes, dislikes, viewer_reaction }))
      })
      .await?
  }

  async fn reaction_counts(&self, target: ReactionTarget) -> Result<ReactionCounts> {
    let target_type = target.target_type().to_string();
    let target_str  = encode_uuid(target.id());

    let (likes, dislikes) = self
      .conn
      .call(move |conn| Ok(counts(conn, &target_type, &target_str)?))
      .await?;

    Ok(ReactionCounts { likes, dislikes })
  }

  async fn list_episode_reactions(&self, episode_id: Uuid) -> Result<Vec<Reaction>> {
    let episode_str = encode_uuid(episode_id);
    let target_type = TargetType::Comment.to_string();

    let raws: Vec<RawReaction> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.reaction_id, r.user_id, r.target_type, r.target_id,
                  r.is_like, r.created_at, r.updated_at
           FROM reactions r
           JOIN comments c ON c.comment_id = r.target_id
           WHERE r.target_type = ?1 AND c.episode_id = ?2",
        )?;
        let rows = stmt
          .query_map(params![target_type, episode_str], RawReaction::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReaction::into_reaction).collect()
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn insert_notification(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      recipient_id:    input.recipient_id,
      kind:            input.kind(),
      payload:         input.payload,
      read_at:         None,
      created_at:      now(),
    };

    let id_str        = encode_uuid(notification.notification_id);
    let recipient_str = encode_uuid(notification.recipient_id);
    let kind_str      = notification.kind.to_string();
    let payload_str   = serde_json::to_string(&notification.payload)?;
    let at_str        = encode_dt(notification.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO notifications ({NOTIFICATION_COLS}) VALUES (?1, ?2, ?3, ?4, NULL, ?5)"
          ),
          params![id_str, recipient_str, kind_str, payload_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(notification)
  }

  async fn list_notifications(&self, recipient: Uuid, page: Page) -> Result<Vec<Notification>> {
    let recipient_str = encode_uuid(recipient);
    let limit  = page.limit as i64;
    let offset = page.offset as i64;

    let raws: Vec<RawNotification> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLS} FROM notifications
           WHERE recipient_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(params![recipient_str, limit, offset], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNotification::into_notification).collect()
  }

  async fn unread_count(&self, recipient: Uuid) -> Result<u64> {
    let recipient_str = encode_uuid(recipient);

    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND read_at IS NULL",
          params![recipient_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    Ok(n.max(0) as u64)
  }

  async fn mark_all_read(&self, recipient: Uuid) -> Result<usize> {
    let recipient_str = encode_uuid(recipient);
    let at_str        = encode_dt(now());

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.execute(
            "UPDATE notifications SET read_at = ?2
             WHERE recipient_id = ?1 AND read_at IS NULL",
            params![recipient_str, at_str],
          )?)
        })
        .await?,
    )
  }

  async fn delete_notification(&self, recipient: Uuid, id: Uuid) -> Result<()> {
    let recipient_str = encode_uuid(recipient);
    let id_str        = encode_uuid(id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM notifications WHERE notification_id = ?1 AND recipient_id = ?2",
          params![id_str, recipient_str],
        )?)
      })
      .await?;

    if deleted == 0 {
      return Err(kaiwa_core::Error::NotificationNotFound(id).into());
    }
    Ok(())
  }

  async fn clear_notifications(&self, recipient: Uuid) -> Result<usize> {
    let recipient_str = encode_uuid(recipient);

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.execute(
            "DELETE FROM notifications WHERE recipient_id = ?1",
            params![recipient_str],
          )?)
        })
        .await?,
    )
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn insert_history(&self, input: NewHistoryEntry) -> Result<HistoryEntry> {
    let at = now();
    let entry = HistoryEntry {
      history_id: Uuid::new_v4(),
      user_id:    input.user_id,
      episode_id: input.episode_id,
      kind:       input.kind,
      metadata:   input.metadata,
      created_at: at,
      updated_at: at,
    };

    let id_str       = encode_uuid(entry.history_id);
    let user_str     = encode_uuid(entry.user_id);
    let episode_str  = encode_uuid(entry.episode_id);
    let kind_str     = entry.kind.to_string();
    let metadata_str = entry.metadata.as_ref().map(serde_json::to_string).transpose()?;
    let at_str       = encode_dt(at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!("INSERT INTO history ({HISTORY_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"),
          params![id_str, user_str, episode_str, kind_str, metadata_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn upsert_view(&self, user_id: Uuid, episode_id: Uuid) -> Result<HistoryEntry> {
    let id_str      = encode_uuid(Uuid::new_v4());
    let user_str    = encode_uuid(user_id);
    let episode_str = encode_uuid(episode_id);
    let kind_str    = HistoryKind::View.to_string();
    let at_str      = encode_dt(now());

    let raw: RawHistory = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          &format!(
            "INSERT INTO history ({HISTORY_COLS}) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)
             ON CONFLICT (user_id, episode_id) WHERE kind = 'view'
             DO UPDATE SET updated_at = excluded.updated_at
             RETURNING {HISTORY_COLS}"
          ),
          params![id_str, user_str, episode_str, kind_str, at_str],
          RawHistory::from_row,
        )?)
      })
      .await?;

    raw.into_entry()
  }

  async fn coalesce_history(
    &self,
    input: NewHistoryEntry,
    since: DateTime<Utc>,
  ) -> Result<(HistoryEntry, bool)> {
    let new_id       = encode_uuid(Uuid::new_v4());
    let user_str     = encode_uuid(input.user_id);
    let episode_str  = encode_uuid(input.episode_id);
    let kind_str     = input.kind.to_string();
    let metadata_str = input.metadata.as_ref().map(serde_json::to_string).transpose()?;
    let since_str    = encode_dt(since);
    let at_str       = encode_dt(now());

    let (raw, merged): (RawHistory, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let recent: Option<String> = tx
          .query_row(
            "SELECT history_id FROM history
             WHERE user_id = ?1 AND episode_id = ?2 AND kind = ?3 AND created_at >= ?4
             ORDER BY created_at DESC
             LIMIT 1",
            params![user_str, episode_str, kind_str, since_str],
            |r| r.get(0),
          )
          .optional()?;

        let (history_id, merged) = match recent {
          Some(id) => {
            tx.execute(
              "UPDATE history SET metadata = COALESCE(?2, metadata), updated_at = ?3
               WHERE history_id = ?1",
              params![id, metadata_str, at_str],
            )?;
            (id, true)
          }
          None => {
            tx.execute(
              &format!(
                "INSERT INTO history ({HISTORY_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"
              ),
              params![new_id, user_str, episode_str, kind_str, metadata_str, at_str],
            )?;
            (new_id, false)
          }
        };

        let raw = tx.query_row(
          &format!("SELECT {HISTORY_COLS} FROM history WHERE history_id = ?1"),
          params![history_id],
          RawHistory::from_row,
        )?;
        tx.commit()?;
        Ok((raw, merged))
      })
      .await?;

    Ok((raw.into_entry()?, merged))
  }

  async fn list_history(&self, user_id: Uuid, page: Page) -> Result<Vec<HistoryEntry>> {
    let user_str = encode_uuid(user_id);
    let limit    = page.limit as i64;
    let offset   = page.offset as i64;

    let raws: Vec<RawHistory> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {HISTORY_COLS} FROM history
           WHERE user_id = ?1
           ORDER BY updated_at DESC, rowid DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(params![user_str, limit, offset], RawHistory::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawHistory::into_entry).collect()
  }

  async fn clear_history(&self, user_id: Uuid) -> Result<usize> {
    let user_str = encode_uuid(user_id);

    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(conn.execute("DELETE FROM history WHERE user_id = ?1", params![user_str])?)
        })
        .await?,
    )
  }

  // ── Watch later ───────────────────────────────────────────────────────────

  async fn add_watch_later(
    &self,
    user_id: Uuid,
    episode_id: Uuid,
  ) -> Result<(WatchLaterEntry, bool)> {
    let id_str      = encode_uuid(Uuid::new_v4());
    let user_str    = encode_uuid(user_id);
    let episode_str = encode_uuid(episode_id);
    let at_str      = encode_dt(now());

    let (raw, created): (RawWatchLater, bool) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let inserted = tx.execute(
          &format!(
            "INSERT INTO watch_later ({WATCH_LATER_COLS}) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, episode_id) DO NOTHING"
          ),
          params![id_str, user_str, episode_str, at_str],
        )?;
        let raw = tx.query_row(
          &format!(
            "SELECT {WATCH_LATER_COLS} FROM watch_later WHERE user_id = ?1 AND episode_id = ?2"
          ),
          params![user_str, episode_str],
          RawWatchLater::from_row,
        )?;
        tx.commit()?;
        Ok((raw, inserted == 1))
      })
      .await?;

    debug!(user = %user_id, episode = %episode_id, created, "watch later upserted");
    Ok((raw.into_entry()?, created))
  }

  async fn remove_watch_later(&self, user_id: Uuid, episode_id: Uuid) -> Result<bool> {
    let user_str    = encode_uuid(user_id);
    let episode_str = encode_uuid(episode_id);

    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM watch_later WHERE user_id = ?1 AND episode_id = ?2",
          params![user_str, episode_str],
        )?)
      })
      .await?;

    Ok(deleted > 0)
  }

  async fn list_watch_later(&self, user_id: Uuid, page: Page) -> Result<Vec<WatchLaterEntry>> {
    let user_str = encode_uuid(user_id);
    let limit    = page.limit as i64;
    let offset   = page.offset as i64;

    let raws: Vec<RawWatchLater> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {WATCH_LATER_COLS} FROM watch_later
           WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt
          .query_map(params![user_str, limit, offset], RawWatchLater::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawWatchLater::into_entry).collect()
  }
}
