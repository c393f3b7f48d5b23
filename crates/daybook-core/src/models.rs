//! Domain models for recorded activity events.

use serde::{Deserialize, Serialize};

/// Window text recorded when the user was away from the machine.
pub const IDLE_MARKER: &str = "__IDLE__";

/// Maximum number of coffee events accepted per day.
pub const COFFEE_DAILY_LIMIT: i64 = 3;

/// A focused-window sample (window title plus process).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub id: i64,
    pub t: i64,
    pub day_t0: i64,
    pub text: String,
    pub source_path: Option<String>,
}

/// Keystrokes counted over one bucket ending at `t`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyfreqEvent {
    pub id: i64,
    pub t: i64,
    pub day_t0: i64,
    pub count: i64,
    pub source_path: Option<String>,
}

/// A free-text note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub id: i64,
    pub t: i64,
    pub day_t0: i64,
    pub text: String,
    pub source_path: Option<String>,
}

/// The journal entry of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogEntry {
    pub day_t0: i64,
    pub text: String,
    pub updated_at: i64,
    pub source_path: Option<String>,
}

/// A single coffee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeeEvent {
    pub id: i64,
    pub t: i64,
    pub day_t0: i64,
    pub milligrams: i64,
}

/// File state recorded the last time a legacy log was imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub source_path: String,
    pub mtime: i64,
    pub size: i64,
    pub imported_at: i64,
}

/// Row counts per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub window_events: i64,
    pub keyfreq_events: i64,
    pub notes_events: i64,
    pub blog_entries: i64,
    pub coffee_events: i64,
    pub ledger_entries: i64,
}

/// Kinds of legacy per-day log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyKind {
    Window,
    Keyfreq,
    Notes,
    Blog,
}

impl LegacyKind {
    pub const ALL: [LegacyKind; 4] = [
        LegacyKind::Window,
        LegacyKind::Keyfreq,
        LegacyKind::Notes,
        LegacyKind::Blog,
    ];

    /// Parse the filename prefix of a legacy log.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "window" => Some(LegacyKind::Window),
            "keyfreq" => Some(LegacyKind::Keyfreq),
            "notes" => Some(LegacyKind::Notes),
            "blog" => Some(LegacyKind::Blog),
            _ => None,
        }
    }

    /// Table holding rows imported from this kind of file.
    pub fn table_name(self) -> &'static str {
        match self {
            LegacyKind::Window => "window_events",
            LegacyKind::Keyfreq => "keyfreq_events",
            LegacyKind::Notes => "notes_events",
            LegacyKind::Blog => "blog_entries",
        }
    }
}

impl std::fmt::Display for LegacyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegacyKind::Window => write!(f, "window"),
            LegacyKind::Keyfreq => write!(f, "keyfreq"),
            LegacyKind::Notes => write!(f, "notes"),
            LegacyKind::Blog => write!(f, "blog"),
        }
    }
}

/// Replace control characters (newlines included) with spaces and trim.
pub fn sanitize_text(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    replaced.trim().to_string()
}

#[cfg(test)]
#[path = "models_tests.rs"]
mod tests;
