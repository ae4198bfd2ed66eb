//! SQL schema for the Kaiwa SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    name          TEXT NOT NULL UNIQUE,
    avatar        TEXT,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);

-- Deleting a comment removes its replies through the parent FK.
CREATE TABLE IF NOT EXISTS comments (
    comment_id TEXT PRIMARY KEY,
    episode_id TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    parent_id  TEXT REFERENCES comments(comment_id) ON DELETE CASCADE,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,   -- RFC 3339, microseconds, always Z
    updated_at TEXT NOT NULL
);

-- Polymorphic target, so no FK; the store deletes reactions explicitly.
CREATE TABLE IF NOT EXISTS reactions (
    reaction_id TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    target_type TEXT NOT NULL,     -- 'comment'
    target_id   TEXT NOT NULL,
    is_like     INTEGER NOT NULL,  -- 1 = like, 0 = dislike
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, target_type, target_id)
);

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    recipient_id    TEXT NOT NULL,
    kind            TEXT NOT NULL,   -- 'reply' | 'like' | 'new_episode'
    payload         TEXT NOT NULL,   -- flat JSON object
    read_at         TEXT,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS history (
    history_id TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    episode_id TEXT NOT NULL,
    kind       TEXT NOT NULL,   -- 'view' | 'comment' | 'reply' | 'like'
    metadata   TEXT,            -- JSON object or NULL
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS watch_later (
    watch_later_id TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL,
    episode_id     TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    UNIQUE (user_id, episode_id)
);

-- At most one view row per (user, episode); the view upsert targets it.
CREATE UNIQUE INDEX IF NOT EXISTS history_view_idx
    ON history(user_id, episode_id) WHERE kind = 'view';

CREATE INDEX IF NOT EXISTS comments_episode_idx      ON comments(episode_id);
CREATE INDEX IF NOT EXISTS comments_parent_idx       ON comments(parent_id);
CREATE INDEX IF NOT EXISTS reactions_target_idx      ON reactions(target_type, target_id);
CREATE INDEX IF NOT EXISTS notifications_recipient_idx
    ON notifications(recipient_id, created_at);
CREATE INDEX IF NOT EXISTS history_user_idx          ON history(user_id, updated_at);
CREATE INDEX IF NOT EXISTS watch_later_user_idx      ON watch_later(user_id, created_at);

PRAGMA user_version = 1;
";
