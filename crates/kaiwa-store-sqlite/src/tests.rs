//! Integration tests for `SqliteStore` against an in-memory database, plus
//! end-to-end engagement flows driven through the service.

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use kaiwa_core::{
  Classify, ErrorKind,
  comment::{Comment, NewComment},
  engagement::{Engagement, EngagementConfig, LikeHistory},
  fanout::EpisodeAnnouncement,
  history::{HistoryEntry, HistoryKind, NewHistoryEntry, REPLIED_TO_CONTENT_CHARS},
  notification::{NewNotification, Notification, NotificationDetail, NotificationKind},
  reaction::{Reaction, ReactionChange, ReactionCounts, ReactionTarget, ReactionTransition},
  store::{EngagementStore, Page},
  tree::CommentNode,
  user::{NewUser, User},
  watch_later::WatchLaterEntry,
};
use serde_json::json;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn user(s: &SqliteStore, name: &str) -> User {
  s.add_user(NewUser {
    name:          name.into(),
    avatar:        None,
    password_hash: "$argon2id$stub".into(),
  })
  .await
  .unwrap()
}

fn new_comment(episode: Uuid, author: Uuid, parent: Option<Uuid>, text: &str) -> NewComment {
  NewComment {
    episode_id: episode,
    user_id:    author,
    parent_id:  parent,
    content:    text.into(),
  }
}

async fn pause() { tokio::time::sleep(StdDuration::from_millis(5)).await }

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_find_users() {
  let s = store().await;
  let amal = user(&s, "amal").await;
  let bo = user(&s, "bo").await;

  let fetched = s.get_user(amal.user_id).await.unwrap().unwrap();
  assert_eq!(fetched, amal);

  let mut both = s
    .get_users(&[amal.user_id, bo.user_id, Uuid::new_v4()])
    .await
    .unwrap();
  both.sort_by(|a, b| a.name.cmp(&b.name));
  assert_eq!(both, vec![amal.clone(), bo]);
  assert!(s.get_users(&[]).await.unwrap().is_empty());

  let (found, hash) = s.find_credentials("amal").await.unwrap().unwrap();
  assert_eq!(found.user_id, amal.user_id);
  assert_eq!(hash, "$argon2id$stub");
  assert!(s.find_credentials("nobody").await.unwrap().is_none());
}

// ─── Comments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_comment() {
  let s = store().await;
  let author = Uuid::new_v4();
  let episode = Uuid::new_v4();

  let c = s
    .insert_comment(new_comment(episode, author, None, "first"))
    .await
    .unwrap();
  let fetched = s.get_comment(c.comment_id).await.unwrap().unwrap();
  assert_eq!(fetched, c);
  assert!(s.get_comment(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn reply_requires_parent_in_same_episode() {
  let s = store().await;
  let author = Uuid::new_v4();
  let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

  let missing = Uuid::new_v4();
  let err = s
    .insert_comment(new_comment(e1, author, Some(missing), "orphan"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(kaiwa_core::Error::ParentNotFound(id)) if id == missing));
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let parent = s.insert_comment(new_comment(e1, author, None, "root")).await.unwrap();
  let err = s
    .insert_comment(new_comment(e2, author, Some(parent.comment_id), "elsewhere"))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert!(s.list_comments(e2).await.unwrap().is_empty());
}

#[tokio::test]
async fn only_author_may_update() {
  let s = store().await;
  let (author, other) = (Uuid::new_v4(), Uuid::new_v4());
  let c = s
    .insert_comment(new_comment(Uuid::new_v4(), author, None, "draft"))
    .await
    .unwrap();

  let err = s
    .update_comment(c.comment_id, other, "hijack".into())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Authorization);
  assert_eq!(s.get_comment(c.comment_id).await.unwrap().unwrap().content, "draft");

  pause().await;
  let edited = s
    .update_comment(c.comment_id, author, "final".into())
    .await
    .unwrap();
  assert_eq!(edited.content, "final");
  assert!(edited.updated_at > c.updated_at);
  assert_eq!(edited.created_at, c.created_at);

  let err = s
    .update_comment(Uuid::new_v4(), author, "x".into())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn delete_cascades_to_descendants_and_reactions() {
  let s = store().await;
  let (author, fan) = (Uuid::new_v4(), Uuid::new_v4());
  let episode = Uuid::new_v4();

  let root = s.insert_comment(new_comment(episode, author, None, "root")).await.unwrap();
  let a = s
    .insert_comment(new_comment(episode, fan, Some(root.comment_id), "a"))
    .await
    .unwrap();
  let b = s
    .insert_comment(new_comment(episode, fan, Some(root.comment_id), "b"))
    .await
    .unwrap();
  let a1 = s
    .insert_comment(new_comment(episode, author, Some(a.comment_id), "a1"))
    .await
    .unwrap();
  let keep = s.insert_comment(new_comment(episode, fan, None, "other")).await.unwrap();

  for id in [root.comment_id, a.comment_id, a1.comment_id, keep.comment_id] {
    s.toggle_reaction(ReactionTarget::Comment(id), fan, true).await.unwrap();
  }

  let err = s.delete_comment(root.comment_id, fan).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Authorization);
  assert_eq!(s.list_comments(episode).await.unwrap().len(), 5);

  let removed = s.delete_comment(root.comment_id, author).await.unwrap();
  assert_eq!(removed, 4);

  for id in [root.comment_id, a.comment_id, b.comment_id, a1.comment_id] {
    assert!(s.get_comment(id).await.unwrap().is_none());
    let counts = s.reaction_counts(ReactionTarget::Comment(id)).await.unwrap();
    assert_eq!((counts.likes, counts.dislikes), (0, 0));
  }
  let left = s.list_comments(episode).await.unwrap();
  assert_eq!(left.len(), 1);
  assert_eq!(left[0].comment_id, keep.comment_id);
  assert_eq!(s.list_episode_reactions(episode).await.unwrap().len(), 1);
}

// ─── Reactions ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn toggle_inserts_removes_and_switches() {
  let s = store().await;
  let c = s
    .insert_comment(new_comment(Uuid::new_v4(), Uuid::new_v4(), None, "hi"))
    .await
    .unwrap();
  let target = ReactionTarget::Comment(c.comment_id);
  let (u, v) = (Uuid::new_v4(), Uuid::new_v4());

  let first = s.toggle_reaction(target, u, true).await.unwrap();
  assert_eq!(first.transition, ReactionTransition::Inserted);
  assert_eq!((first.likes, first.dislikes), (1, 0));
  assert_eq!(first.viewer_reaction, Some(true));

  s.toggle_reaction(target, v, false).await.unwrap();

  let switched = s.toggle_reaction(target, u, false).await.unwrap();
  assert_eq!(switched.transition, ReactionTransition::Switched);
  assert_eq!((switched.likes, switched.dislikes), (0, 2));
  assert_eq!(switched.viewer_reaction, Some(false));

  let removed = s.toggle_reaction(target, u, false).await.unwrap();
  assert_eq!(removed.transition, ReactionTransition::Removed);
  assert_eq!((removed.likes, removed.dislikes), (0, 1));
  assert_eq!(removed.viewer_reaction, None);

  let rows = s.list_episode_reactions(c.episode_id).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].user_id, v);
  assert!(!rows[0].is_like);
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn notification_inbox_lifecycle() {
  let s = store().await;
  let svc = Engagement::new(Arc::new(s.clone()), EngagementConfig::default());
  let (me, other) = (Uuid::new_v4(), Uuid::new_v4());

  let first = EpisodeAnnouncement {
    episode_id:   Uuid::new_v4(),
    title:        "Episode 1".into(),
    thumbnail:    None,
    duration:     Some("24:00".into()),
    published_at: Utc::now(),
  };
  let second = EpisodeAnnouncement {
    episode_id: Uuid::new_v4(),
    title: "Episode 2".into(),
    ..first.clone()
  };
  assert_eq!(svc.announce_episode(&first, &[me, other]).await, 2);
  pause().await;
  svc.announce_episode(&second, &[me]).await;

  let listed = s.list_notifications(me, Page::default()).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].payload.title, "New episode added: Episode 2");
  assert_eq!(listed[0].kind, NotificationKind::NewEpisode);
  assert!(!listed[0].is_read());
  assert_eq!(s.unread_count(me).await.unwrap(), 2);

  let one = s.list_notifications(me, Page { limit: 1, offset: 1 }).await.unwrap();
  assert_eq!(one.len(), 1);
  assert_eq!(one[0].payload.title, "New episode added: Episode 1");

  assert_eq!(s.mark_all_read(me).await.unwrap(), 2);
  assert_eq!(s.mark_all_read(me).await.unwrap(), 0);
  assert_eq!(s.unread_count(me).await.unwrap(), 0);
  assert_eq!(s.unread_count(other).await.unwrap(), 1);

  let theirs = s.list_notifications(other, Page::default()).await.unwrap();
  let err = s
    .delete_notification(me, theirs[0].notification_id)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  s.delete_notification(me, listed[0].notification_id).await.unwrap();
  assert_eq!(s.clear_notifications(me).await.unwrap(), 1);
  assert!(s.list_notifications(me, Page::default()).await.unwrap().is_empty());
  assert_eq!(s.list_notifications(other, Page::default()).await.unwrap().len(), 1);
}

// ─── History ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeat_views_touch_one_row() {
  let s = store().await;
  let (u, e) = (Uuid::new_v4(), Uuid::new_v4());

  let first = s.upsert_view(u, e).await.unwrap();
  assert_eq!(first.kind, HistoryKind::View);
  assert_eq!(first.created_at, first.updated_at);

  pause().await;
  let second = s.upsert_view(u, e).await.unwrap();
  assert_eq!(second.history_id, first.history_id);
  assert_eq!(second.created_at, first.created_at);
  assert!(second.updated_at > first.updated_at);

  let rows = s.list_history(u, Page::default()).await.unwrap();
  assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn coalescing_respects_the_window() {
  let s = store().await;
  let (u, e) = (Uuid::new_v4(), Uuid::new_v4());
  let entry = |metadata| NewHistoryEntry {
    user_id: u,
    episode_id: e,
    kind: HistoryKind::Comment,
    metadata,
  };

  let since = Utc::now() - Duration::minutes(5);
  let (first, merged) = s
    .coalesce_history(entry(Some(json!({ "n": 1 }))), since)
    .await
    .unwrap();
  assert!(!merged);

  pause().await;
  let (again, merged) = s.coalesce_history(entry(None), since).await.unwrap();
  assert!(merged);
  assert_eq!(again.history_id, first.history_id);
  assert_eq!(again.metadata, Some(json!({ "n": 1 })));
  assert!(again.updated_at > first.updated_at);

  let (replaced, _) = s
    .coalesce_history(entry(Some(json!({ "n": 2 }))), since)
    .await
    .unwrap();
  assert_eq!(replaced.metadata, Some(json!({ "n": 2 })));

  // A window that starts after the entry was created no longer matches.
  let (fresh, merged) = s
    .coalesce_history(entry(None), Utc::now() + Duration::seconds(1))
    .await
    .unwrap();
  assert!(!merged);
  assert_ne!(fresh.history_id, first.history_id);
  assert_eq!(s.list_history(u, Page::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn history_is_newest_first_and_clearable() {
  let s = store().await;
  let u = Uuid::new_v4();
  let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

  s.upsert_view(u, e1).await.unwrap();
  pause().await;
  s.insert_history(NewHistoryEntry {
    user_id:    u,
    episode_id: e2,
    kind:       HistoryKind::Like,
    metadata:   None,
  })
  .await
  .unwrap();
  pause().await;
  s.upsert_view(u, e1).await.unwrap();

  let rows = s.list_history(u, Page::default()).await.unwrap();
  let kinds: Vec<_> = rows.iter().map(|h| h.kind).collect();
  assert_eq!(kinds, vec![HistoryKind::View, HistoryKind::Like]);

  assert_eq!(s.clear_history(Uuid::new_v4()).await.unwrap(), 0);
  assert_eq!(s.clear_history(u).await.unwrap(), 2);
  assert!(s.list_history(u, Page::default()).await.unwrap().is_empty());
}

// ─── Watch later ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn watch_later_is_a_set_per_user() {
  let s = store().await;
  let u = Uuid::new_v4();
  let (e1, e2) = (Uuid::new_v4(), Uuid::new_v4());

  let (first, created) = s.add_watch_later(u, e1).await.unwrap();
  assert!(created);
  let (again, created) = s.add_watch_later(u, e1).await.unwrap();
  assert!(!created);
  assert_eq!(again, first);

  pause().await;
  s.add_watch_later(u, e2).await.unwrap();
  s.add_watch_later(Uuid::new_v4(), e1).await.unwrap();

  let saved: Vec<_> = s
    .list_watch_later(u, Page::default())
    .await
    .unwrap()
    .into_iter()
    .map(|w| w.episode_id)
    .collect();
  assert_eq!(saved, vec![e2, e1]);

  let second_page = s.list_watch_later(u, Page { limit: 1, offset: 1 }).await.unwrap();
  assert_eq!(second_page.len(), 1);
  assert_eq!(second_page[0].episode_id, e1);

  assert!(s.remove_watch_later(u, e1).await.unwrap());
  assert!(!s.remove_watch_later(u, e1).await.unwrap());
  assert_eq!(s.list_watch_later(u, Page::default()).await.unwrap().len(), 1);
}

// ─── Engagement flows ────────────────────────────────────────────────────────

struct World {
  store: SqliteStore,
  svc:   Engagement<SqliteStore>,
}

async fn world() -> World {
  let store = store().await;
  let svc = Engagement::new(Arc::new(store.clone()), EngagementConfig::default());
  World { store, svc }
}

fn depth(nodes: &[CommentNode]) -> usize {
  nodes.iter().map(|n| 1 + depth(&n.children)).max().unwrap_or(0)
}

#[tokio::test]
async fn reply_and_like_scenario() {
  let w = world().await;
  let a = user(&w.store, "amal").await;
  let b = user(&w.store, "bo").await;
  let episode = Uuid::new_v4();

  let c1_text = "a long first comment that goes well past the fifty character cut";
  let c1 = w
    .svc
    .post_comment(Some(a.user_id), episode, c1_text.into(), None)
    .await
    .unwrap();
  let c2 = w
    .svc
    .post_comment(Some(b.user_id), episode, "agreed".into(), Some(c1.comment_id))
    .await
    .unwrap();

  let a_inbox = w.svc.notifications(Some(a.user_id), Page::default()).await.unwrap();
  assert_eq!(a_inbox.unread_count, 1);
  match &a_inbox.notifications[0].payload.detail {
    NotificationDetail::Reply { replier_name, .. } => assert_eq!(replier_name, "bo"),
    other => panic!("expected reply notification, got {other:?}"),
  }

  let b_history = w.svc.history(Some(b.user_id), Page::default()).await.unwrap();
  assert_eq!(b_history.len(), 1);
  assert_eq!(b_history[0].kind, HistoryKind::Reply);
  let meta = b_history[0].metadata.as_ref().unwrap();
  assert_eq!(meta["replied_to_user"], "amal");
  let snippet = meta["replied_to_content"].as_str().unwrap();
  assert!(snippet.chars().count() <= REPLIED_TO_CONTENT_CHARS);

  let result = w
    .svc
    .react(Some(a.user_id), c2.comment_id, true, LikeHistory::Record)
    .await
    .unwrap();
  assert_eq!(result.likes, 1);
  assert!(result.notify_owner);

  let b_inbox = w.svc.notifications(Some(b.user_id), Page::default()).await.unwrap();
  assert_eq!(b_inbox.notifications.len(), 1);
  assert_eq!(b_inbox.notifications[0].kind, NotificationKind::Like);

  let a_history = w.svc.history(Some(a.user_id), Page::default()).await.unwrap();
  let like = a_history
    .iter()
    .find(|h| h.kind == HistoryKind::Like)
    .expect("like history");
  let meta = like.metadata.as_ref().unwrap();
  assert_eq!(meta["comment_owner"], "bo");
  assert_eq!(meta["comment_content"], "agreed");
  assert!(a_history.iter().any(|h| h.kind == HistoryKind::Comment));
}

#[tokio::test]
async fn double_like_is_idempotent() {
  let w = world().await;
  let owner = user(&w.store, "owner").await;
  let fan = user(&w.store, "fan").await;
  let c = w
    .svc
    .post_comment(Some(owner.user_id), Uuid::new_v4(), "hello".into(), None)
    .await
    .unwrap();

  w.svc
    .react(Some(fan.user_id), c.comment_id, true, LikeHistory::Record)
    .await
    .unwrap();
  let second = w
    .svc
    .react(Some(fan.user_id), c.comment_id, true, LikeHistory::Record)
    .await
    .unwrap();

  assert_eq!(second.likes, 0);
  assert_eq!(second.viewer_reaction, None);
  assert!(!second.notify_owner);
  let inbox = w.svc.notifications(Some(owner.user_id), Page::default()).await.unwrap();
  assert_eq!(inbox.notifications.len(), 1);
}

#[tokio::test]
async fn switch_notifies_again() {
  let w = world().await;
  let owner = user(&w.store, "owner").await;
  let fan = user(&w.store, "fan").await;
  let c = w
    .svc
    .post_comment(Some(owner.user_id), Uuid::new_v4(), "hello".into(), None)
    .await
    .unwrap();

  w.svc
    .react(Some(fan.user_id), c.comment_id, true, LikeHistory::Record)
    .await
    .unwrap();
  let switched = w
    .svc
    .react(Some(fan.user_id), c.comment_id, false, LikeHistory::Record)
    .await
    .unwrap();

  assert_eq!((switched.likes, switched.dislikes), (0, 1));
  assert_eq!(switched.viewer_reaction, Some(false));

  let inbox = w.svc.notifications(Some(owner.user_id), Page::default()).await.unwrap();
  let likes: Vec<bool> = inbox
    .notifications
    .iter()
    .filter_map(|n| match n.payload.detail {
      NotificationDetail::Like { is_like, .. } => Some(is_like),
      _ => None,
    })
    .collect();
  assert_eq!(likes.len(), 2);
  assert!(likes.contains(&false));

  // Dislikes never reach history.
  let fan_history = w.svc.history(Some(fan.user_id), Page::default()).await.unwrap();
  assert_eq!(fan_history.iter().filter(|h| h.kind == HistoryKind::Like).count(), 1);
}

#[tokio::test]
async fn self_actions_never_notify() {
  let w = world().await;
  let me = user(&w.store, "me").await;
  let episode = Uuid::new_v4();

  let c = w
    .svc
    .post_comment(Some(me.user_id), episode, "talking to myself".into(), None)
    .await
    .unwrap();
  w.svc
    .post_comment(Some(me.user_id), episode, "still me".into(), Some(c.comment_id))
    .await
    .unwrap();
  let liked = w
    .svc
    .react(Some(me.user_id), c.comment_id, true, LikeHistory::Record)
    .await
    .unwrap();
  w.svc
    .react(Some(me.user_id), c.comment_id, false, LikeHistory::Record)
    .await
    .unwrap();

  assert!(!liked.notify_owner);
  let inbox = w.svc.notifications(Some(me.user_id), Page::default()).await.unwrap();
  assert!(inbox.notifications.is_empty());
  assert_eq!(inbox.unread_count, 0);
}

#[tokio::test]
async fn both_reaction_entry_points_agree() {
  let w = world().await;
  let owner = user(&w.store, "owner").await;
  let episode = Uuid::new_v4();
  let fan = user(&w.store, "fan").await;

  let x = w
    .svc
    .post_comment(Some(owner.user_id), episode, "x".into(), None)
    .await
    .unwrap();
  let y = w
    .svc
    .post_comment(Some(owner.user_id), episode, "y".into(), None)
    .await
    .unwrap();

  for is_like in [true, false, false, true, true] {
    let a = w
      .svc
      .react(Some(fan.user_id), x.comment_id, is_like, LikeHistory::Record)
      .await
      .unwrap();
    let b = w
      .svc
      .react(Some(fan.user_id), y.comment_id, is_like, LikeHistory::Skip)
      .await
      .unwrap();
    assert_eq!(a, b);
  }

  let fan_history = w.svc.history(Some(fan.user_id), Page::default()).await.unwrap();
  assert!(
    fan_history
      .iter()
      .filter_map(|h| h.metadata.as_ref())
      .all(|m| m["comment_id"] == json!(x.comment_id))
  );
}

#[tokio::test]
async fn deep_chains_are_cut_but_retrievable() {
  let w = world().await;
  let u = user(&w.store, "u").await;
  let episode = Uuid::new_v4();

  let mut parent = None;
  let mut chain = Vec::new();
  for i in 0..8 {
    let c = w
      .svc
      .post_comment(Some(u.user_id), episode, format!("level {i}"), parent)
      .await
      .unwrap();
    parent = Some(c.comment_id);
    chain.push(c);
  }

  let tree = w.svc.comment_tree(episode, Some(u.user_id)).await.unwrap();
  assert_eq!(tree.len(), 1);
  assert_eq!(depth(&tree), 5);
  assert_eq!(tree[0].author.as_ref().map(|a| a.name.as_str()), Some("u"));

  let deepest = chain.last().unwrap();
  let fetched = w.svc.get_comment(deepest.comment_id).await.unwrap();
  assert_eq!(fetched.content, "level 7");

  w.svc.delete_comment(Some(u.user_id), chain[0].comment_id).await.unwrap();
  let err = w.svc.get_comment(deepest.comment_id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn anonymous_and_invalid_writes_are_rejected() {
  let w = world().await;
  let u = user(&w.store, "u").await;
  let episode = Uuid::new_v4();

  let err = w
    .svc
    .post_comment(None, episode, "hi".into(), None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Authorization);
  assert!(err.is_unauthenticated());

  let err = w
    .svc
    .post_comment(Some(u.user_id), episode, "   ".into(), None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  let err = w
    .svc
    .post_comment(Some(u.user_id), episode, "x".repeat(1001), None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  assert!(w.store.list_comments(episode).await.unwrap().is_empty());
  assert!(w.svc.record_view(None, episode).await.is_err());
}

#[tokio::test]
async fn activity_entry_point_coalesces_and_views_upsert() {
  let w = world().await;
  let u = Uuid::new_v4();
  let episode = Uuid::new_v4();

  let (first, merged) = w
    .svc
    .record_activity(Some(u), episode, HistoryKind::Comment, Some(json!({ "k": 1 })))
    .await
    .unwrap();
  assert!(!merged);
  let (second, merged) = w
    .svc
    .record_activity(Some(u), episode, HistoryKind::Comment, None)
    .await
    .unwrap();
  assert!(merged);
  assert_eq!(first.history_id, second.history_id);

  w.svc.record_view(Some(u), episode).await.unwrap();
  pause().await;
  let (view, merged) = w
    .svc
    .record_activity(Some(u), episode, HistoryKind::View, None)
    .await
    .unwrap();
  assert!(merged);
  assert_eq!(view.kind, HistoryKind::View);

  let rows = w.svc.history(Some(u), Page::default()).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert_eq!(w.svc.clear_history(Some(u)).await.unwrap(), 2);
}

#[tokio::test]
async fn edits_check_the_comment_before_its_content() {
  let w = world().await;
  let a = user(&w.store, "amal").await;
  let b = user(&w.store, "bo").await;
  let c = w
    .svc
    .post_comment(Some(a.user_id), Uuid::new_v4(), "mine".into(), None)
    .await
    .unwrap();

  let err = w
    .svc
    .edit_comment(Some(b.user_id), c.comment_id, String::new())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Authorization);
  assert!(!err.is_unauthenticated());

  let err = w
    .svc
    .edit_comment(Some(b.user_id), Uuid::new_v4(), "x".repeat(1001))
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = w
    .svc
    .edit_comment(Some(a.user_id), c.comment_id, "  ".into())
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);

  assert_eq!(w.svc.get_comment(c.comment_id).await.unwrap().content, "mine");
}

#[tokio::test]
async fn content_is_stored_trimmed() {
  let w = world().await;
  let u = user(&w.store, "u").await;

  let c = w
    .svc
    .post_comment(Some(u.user_id), Uuid::new_v4(), "  hi  \n".into(), None)
    .await
    .unwrap();
  assert_eq!(c.content, "hi");

  let body = "x".repeat(999);
  let edited = w
    .svc
    .edit_comment(Some(u.user_id), c.comment_id, format!("{body}     "))
    .await
    .unwrap();
  assert_eq!(edited.content, body);
  assert_eq!(w.store.get_comment(c.comment_id).await.unwrap().unwrap().content, body);
}

#[tokio::test]
async fn watch_later_through_the_service() {
  let w = world().await;
  let u = user(&w.store, "u").await;
  let episode = Uuid::new_v4();

  let (entry, created) = w.svc.add_to_watch_later(Some(u.user_id), episode).await.unwrap();
  assert!(created);
  assert_eq!(entry.user_id, u.user_id);
  let (_, created) = w.svc.add_to_watch_later(Some(u.user_id), episode).await.unwrap();
  assert!(!created);

  let saved = w.svc.watch_later(Some(u.user_id), Page::default()).await.unwrap();
  assert_eq!(saved, vec![entry]);

  assert!(w.svc.remove_from_watch_later(Some(u.user_id), episode).await.unwrap());
  assert!(!w.svc.remove_from_watch_later(Some(u.user_id), episode).await.unwrap());

  let err = w.svc.add_to_watch_later(None, episode).await.unwrap_err();
  assert!(err.is_unauthenticated());
}

// ─── Failing side effects ────────────────────────────────────────────────────

/// Delegates to [`SqliteStore`] but fails every notification and history
/// write.
struct LossySideEffects(SqliteStore);

fn write_failed() -> Error { Error::Database(tokio_rusqlite::Error::ConnectionClosed) }

impl EngagementStore for LossySideEffects {
  type Error = Error;

  async fn add_user(&self, input: NewUser) -> Result<User, Error> {
    self.0.add_user(input).await
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>, Error> {
    self.0.get_user(id).await
  }

  async fn get_users(&self, ids: &[Uuid]) -> Result<Vec<User>, Error> {
    self.0.get_users(ids).await
  }

  async fn find_credentials(&self, name: &str) -> Result<Option<(User, String)>, Error> {
    self.0.find_credentials(name).await
  }

  async fn insert_comment(&self, input: NewComment) -> Result<Comment, Error> {
    self.0.insert_comment(input).await
  }

  async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, Error> {
    self.0.get_comment(id).await
  }

  async fn update_comment(&self, id: Uuid, author: Uuid, content: String) -> Result<Comment, Error> {
    self.0.update_comment(id, author, content).await
  }

  async fn delete_comment(&self, id: Uuid, author: Uuid) -> Result<usize, Error> {
    self.0.delete_comment(id, author).await
  }

  async fn list_comments(&self, episode_id: Uuid) -> Result<Vec<Comment>, Error> {
    self.0.list_comments(episode_id).await
  }

  async fn toggle_reaction(
    &self,
    target: ReactionTarget,
    user_id: Uuid,
    is_like: bool,
  ) -> Result<ReactionChange, Error> {
    self.0.toggle_reaction(target, user_id, is_like).await
  }

  async fn reaction_counts(&self, target: ReactionTarget) -> Result<ReactionCounts, Error> {
    self.0.reaction_counts(target).await
  }

  async fn list_episode_reactions(&self, episode_id: Uuid) -> Result<Vec<Reaction>, Error> {
    self.0.list_episode_reactions(episode_id).await
  }

  async fn insert_notification(&self, _input: NewNotification) -> Result<Notification, Error> {
    Err(write_failed())
  }

  async fn list_notifications(&self, recipient: Uuid, page: Page) -> Result<Vec<Notification>, Error> {
    self.0.list_notifications(recipient, page).await
  }

  async fn unread_count(&self, recipient: Uuid) -> Result<u64, Error> {
    self.0.unread_count(recipient).await
  }

  async fn mark_all_read(&self, recipient: Uuid) -> Result<usize, Error> {
    self.0.mark_all_read(recipient).await
  }

  async fn delete_notification(&self, recipient: Uuid, id: Uuid) -> Result<(), Error> {
    self.0.delete_notification(recipient, id).await
  }

  async fn clear_notifications(&self, recipient: Uuid) -> Result<usize, Error> {
    self.0.clear_notifications(recipient).await
  }

  async fn insert_history(&self, _input: NewHistoryEntry) -> Result<HistoryEntry, Error> {
    Err(write_failed())
  }

  async fn upsert_view(&self, user_id: Uuid, episode_id: Uuid) -> Result<HistoryEntry, Error> {
    self.0.upsert_view(user_id, episode_id).await
  }

  async fn coalesce_history(
    &self,
    input: NewHistoryEntry,
    since: DateTime<Utc>,
  ) -> Result<(HistoryEntry, bool), Error> {
    self.0.coalesce_history(input, since).await
  }

  async fn list_history(&self, user_id: Uuid, page: Page) -> Result<Vec<HistoryEntry>, Error> {
    self.0.list_history(user_id, page).await
  }

  async fn clear_history(&self, user_id: Uuid) -> Result<usize, Error> {
    self.0.clear_history(user_id).await
  }

  async fn add_watch_later(
    &self,
    user_id: Uuid,
    episode_id: Uuid,
  ) -> Result<(WatchLaterEntry, bool), Error> {
    self.0.add_watch_later(user_id, episode_id).await
  }

  async fn remove_watch_later(&self, user_id: Uuid, episode_id: Uuid) -> Result<bool, Error> {
    self.0.remove_watch_later(user_id, episode_id).await
  }

  async fn list_watch_later(&self, user_id: Uuid, page: Page) -> Result<Vec<WatchLaterEntry>, Error> {
    self.0.list_watch_later(user_id, page).await
  }
}

#[tokio::test]
async fn failed_side_effects_keep_the_primary_write() {
  let s = store().await;
  let a = user(&s, "amal").await;
  let b = user(&s, "bo").await;
  let svc = Engagement::new(Arc::new(LossySideEffects(s.clone())), EngagementConfig::default());
  let episode = Uuid::new_v4();

  let root = svc
    .post_comment(Some(a.user_id), episode, "root".into(), None)
    .await
    .unwrap();
  let reply = svc
    .post_comment(Some(b.user_id), episode, "reply".into(), Some(root.comment_id))
    .await
    .unwrap();
  let result = svc
    .react(Some(a.user_id), reply.comment_id, true, LikeHistory::Record)
    .await
    .unwrap();
  assert_eq!(result.likes, 1);
  assert!(result.notify_owner);

  let ids: Vec<_> = s
    .list_comments(episode)
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.comment_id)
    .collect();
  assert!(ids.contains(&root.comment_id));
  assert!(ids.contains(&reply.comment_id));

  let reactions = s.list_episode_reactions(episode).await.unwrap();
  assert_eq!(reactions.len(), 1);
  assert_eq!(reactions[0].user_id, a.user_id);
  assert!(reactions[0].is_like);

  for u in [a.user_id, b.user_id] {
    assert!(s.list_notifications(u, Page::default()).await.unwrap().is_empty());
    assert!(s.list_history(u, Page::default()).await.unwrap().is_empty());
  }
}
