//! SQL schema for the tagbook SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (tag, timestamp) observation. Exactly one of num_value and
-- str_value is expected to be set, but nothing here enforces it.
CREATE TABLE IF NOT EXISTS facts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    tag_name   TEXT    NOT NULL CHECK (length(tag_name) <= 40),
    num_value  INTEGER,
    str_value  TEXT    CHECK (str_value IS NULL OR length(str_value) <= 40),
    timestamp  TEXT    NOT NULL   -- RFC 3339 UTC, microsecond precision
               DEFAULT (strftime('%Y-%m-%dT%H:%M:%f', 'now') || '000Z')
);

CREATE INDEX IF NOT EXISTS facts_tag_time_idx ON facts(tag_name, timestamp);
CREATE INDEX IF NOT EXISTS facts_time_idx     ON facts(timestamp);

PRAGMA user_version = 1;
";
