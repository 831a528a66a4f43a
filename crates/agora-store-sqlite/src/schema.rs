//! SQL schema for the Agora SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Identity rows owned by the external account layer; the core only checks
-- that ids resolve.
CREATE TABLE IF NOT EXISTS users (
    user_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    post_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id INTEGER NOT NULL,
    author_id  INTEGER NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL,
    deleted_at TEXT
);

-- Replies are never hard-deleted; deleted_at marks a soft delete.
CREATE TABLE IF NOT EXISTS replies (
    reply_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id    INTEGER NOT NULL REFERENCES posts(post_id),
    author_id  INTEGER NOT NULL REFERENCES users(user_id),
    content    TEXT NOT NULL,
    parent_id  INTEGER REFERENCES replies(reply_id),
    created_at TEXT NOT NULL,   -- RFC 3339 UTC, fixed microsecond precision
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE TABLE IF NOT EXISTS votes (
    vote_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    post_id    INTEGER REFERENCES posts(post_id) ON DELETE CASCADE,
    reply_id   INTEGER REFERENCES replies(reply_id) ON DELETE CASCADE,
    vote_type  TEXT NOT NULL CHECK (vote_type IN ('upvote', 'downvote')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CONSTRAINT unique_user_post_vote  UNIQUE (user_id, post_id),
    CONSTRAINT unique_user_reply_vote UNIQUE (user_id, reply_id),
    CONSTRAINT vote_target_constraint CHECK (
        (post_id IS NOT NULL AND reply_id IS NULL)
        OR (post_id IS NULL AND reply_id IS NOT NULL)
    )
);

CREATE INDEX IF NOT EXISTS replies_post_idx    ON replies(post_id, created_at);
CREATE INDEX IF NOT EXISTS replies_parent_idx  ON replies(parent_id);
CREATE INDEX IF NOT EXISTS replies_author_idx  ON replies(author_id);
CREATE INDEX IF NOT EXISTS votes_post_idx      ON votes(post_id);
CREATE INDEX IF NOT EXISTS votes_reply_idx     ON votes(reply_id);
CREATE INDEX IF NOT EXISTS votes_user_time_idx ON votes(user_id, created_at);

PRAGMA user_version = 1;
";
