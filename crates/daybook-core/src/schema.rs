//! Database schema for daybook.

/// SQL schema for the event tables and the legacy import ledger.
///
/// Every event table is indexed on `(day_t0, t)`, which is the access path
/// of all per-day reads. `source_path` is only set on rows that came from a
/// legacy log file.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS window_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    t INTEGER NOT NULL,
    day_t0 INTEGER NOT NULL,
    s TEXT NOT NULL,
    source_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_window_day_t ON window_events(day_t0, t);
CREATE INDEX IF NOT EXISTS idx_window_source ON window_events(source_path);

CREATE TABLE IF NOT EXISTS keyfreq_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    t INTEGER NOT NULL,
    day_t0 INTEGER NOT NULL,
    s INTEGER NOT NULL CHECK (s >= 0),
    source_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_keyfreq_day_t ON keyfreq_events(day_t0, t);
CREATE INDEX IF NOT EXISTS idx_keyfreq_source ON keyfreq_events(source_path);

CREATE TABLE IF NOT EXISTS notes_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    t INTEGER NOT NULL,
    day_t0 INTEGER NOT NULL,
    s TEXT NOT NULL,
    source_path TEXT
);
CREATE INDEX IF NOT EXISTS idx_notes_day_t ON notes_events(day_t0, t);
CREATE INDEX IF NOT EXISTS idx_notes_source ON notes_events(source_path);

CREATE TABLE IF NOT EXISTS blog_entries (
    day_t0 INTEGER PRIMARY KEY,
    post TEXT NOT NULL DEFAULT '',
    updated_at INTEGER NOT NULL,
    source_path TEXT
);

CREATE TABLE IF NOT EXISTS coffee_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    t INTEGER NOT NULL,
    day_t0 INTEGER NOT NULL,
    mg INTEGER NOT NULL CHECK (mg >= 0)
);
CREATE INDEX IF NOT EXISTS idx_coffee_day_t ON coffee_events(day_t0, t);

CREATE TABLE IF NOT EXISTS legacy_import_state (
    source_path TEXT PRIMARY KEY,
    mtime INTEGER NOT NULL,
    size INTEGER NOT NULL,
    imported_at INTEGER NOT NULL
);
"#;
