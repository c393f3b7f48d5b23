//! Migration of legacy per-day log files into the event store.
//!
//! Legacy logs live in one directory as `<kind>_<day_t0>.txt`. Each import
//! is recorded in the ledger with the file's `(mtime, size)`; a file is only
//! read again once either value changes, and a re-import first retracts
//! everything the previous import of that file produced. Running a
//! backfill any number of times therefore converges on the same rows.
//!
//! Change detection by `(mtime, size)` cannot see an edit that keeps both
//! values; `force` re-imports every file regardless.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::day::{DAY_SECONDS, day_start, day_start_in, in_day, parse_timestamp};
use crate::db::EventStore;
use crate::error::{Error, Result};
use crate::models::{LegacyKind, sanitize_text};

/// Outcome of one backfill pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillSummary {
    /// Legacy files found in the directory.
    pub files_seen: u64,
    /// Files whose rows were (re)imported.
    pub files_imported: u64,
    /// Files that could not be read.
    pub files_failed: u64,
    pub rows_inserted: u64,
    pub rows_malformed: u64,
}

/// A legacy log file recognized by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyFile {
    pub kind: LegacyKind,
    pub day_t0: i64,
    pub path: PathBuf,
}

/// One parsed legacy row together with the day it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRow<V> {
    pub t: i64,
    /// Day boundary of `t`, not necessarily the day in the file name.
    pub day_t0: i64,
    pub value: V,
}

/// Rows parsed out of one legacy file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyRows {
    Window(Vec<LegacyRow<String>>),
    Keyfreq(Vec<LegacyRow<i64>>),
    Notes(Vec<LegacyRow<String>>),
    Blog(LegacyRow<String>),
}

impl LegacyRows {
    pub fn kind(&self) -> LegacyKind {
        match self {
            LegacyRows::Window(_) => LegacyKind::Window,
            LegacyRows::Keyfreq(_) => LegacyKind::Keyfreq,
            LegacyRows::Notes(_) => LegacyKind::Notes,
            LegacyRows::Blog(_) => LegacyKind::Blog,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LegacyRows::Window(rows) | LegacyRows::Notes(rows) => rows.len(),
            LegacyRows::Keyfreq(rows) => rows.len(),
            LegacyRows::Blog(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the store needs to replace one file's contribution.
#[derive(Debug, Clone)]
pub(crate) struct LegacyImport {
    pub source_path: String,
    pub rows: LegacyRows,
    pub mtime: i64,
    pub size: i64,
}

/// Parse `<kind>_<day_t0>.txt`.
///
/// Names whose number is not a usable timestamp, or whose window would run
/// past `i64::MAX`, are not legacy logs.
pub fn parse_legacy_name(name: &str) -> Option<(LegacyKind, i64)> {
    let stem = name.strip_suffix(".txt")?;
    let (prefix, digits) = stem.split_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let kind = LegacyKind::from_prefix(prefix)?;
    let day_t0: i64 = digits.parse().ok()?;
    day_t0.checked_add(DAY_SECONDS)?;
    day_start(day_t0).ok()?;
    Some((kind, day_t0))
}

/// List legacy files in `dir`, sorted by absolute path. Symlinks to regular
/// files are included.
pub fn scan_legacy_dir(dir: &Path) -> Result<Vec<LegacyFile>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some((kind, day_t0)) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_legacy_name)
        else {
            continue;
        };
        let path = std::path::absolute(&path).unwrap_or(path);
        files.push(LegacyFile { kind, day_t0, path });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Split a `"<timestamp> <value>"` line.
fn parse_line(line: &str) -> Result<(i64, &str)> {
    let (stamp, value) = line
        .split_once(' ')
        .ok_or_else(|| Error::MalformedRow(format!("missing value: {line:?}")))?;
    let t = parse_timestamp(stamp)
        .map_err(|_| Error::MalformedRow(format!("bad timestamp: {line:?}")))?;
    Ok((t, value))
}

/// Parse the body of a legacy file, assigning days in the local timezone.
///
/// Returns the surviving rows and the number of malformed lines. Rows
/// outside the file's day window, empty texts and negative counts are
/// dropped without being counted as malformed.
pub fn parse_legacy_body(kind: LegacyKind, day_t0: i64, body: &str) -> (LegacyRows, u64) {
    parse_legacy_body_in(kind, day_t0, body, &Local)
}

/// [`parse_legacy_body`] with an explicit timezone for day assignment.
///
/// The file name only selects the window of accepted timestamps; every row
/// is filed under `day_start(t)`, the same day a live insert at `t` gets.
pub fn parse_legacy_body_in<Tz: TimeZone>(
    kind: LegacyKind,
    day_t0: i64,
    body: &str,
    tz: &Tz,
) -> (LegacyRows, u64) {
    if kind == LegacyKind::Blog {
        let blog_day = day_start_in(day_t0, tz).unwrap_or(day_t0);
        let row = LegacyRow {
            t: day_t0,
            day_t0: blog_day,
            value: body.to_string(),
        };
        return (LegacyRows::Blog(row), 0);
    }

    let mut malformed = 0u64;
    let mut texts = Vec::new();
    let mut counts = Vec::new();

    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (t, value) = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::trace!("Skipping {kind} line: {err}");
                malformed += 1;
                continue;
            }
        };
        if !in_day(day_t0, t) {
            continue;
        }
        let Ok(row_day) = day_start_in(t, tz) else {
            tracing::trace!("Skipping {kind} line without a day: {line:?}");
            malformed += 1;
            continue;
        };

        if kind == LegacyKind::Keyfreq {
            match value.trim().parse::<i64>() {
                Ok(count) if count >= 0 => counts.push(LegacyRow {
                    t,
                    day_t0: row_day,
                    value: count,
                }),
                Ok(_) => {}
                Err(_) => {
                    tracing::trace!("Skipping keyfreq line with bad count: {line:?}");
                    malformed += 1;
                }
            }
        } else {
            let text = sanitize_text(value);
            if !text.is_empty() {
                texts.push(LegacyRow {
                    t,
                    day_t0: row_day,
                    value: text,
                });
            }
        }
    }

    let rows = match kind {
        LegacyKind::Keyfreq => LegacyRows::Keyfreq(counts),
        LegacyKind::Notes => LegacyRows::Notes(texts),
        LegacyKind::Window | LegacyKind::Blog => LegacyRows::Window(texts),
    };
    (rows, malformed)
}

struct FileOutcome {
    inserted: u64,
    malformed: u64,
}

/// Import every new or changed legacy file in `logs_dir`.
///
/// An unreadable file is logged and counted in `files_failed`; it does not
/// stop the remaining files. Storage failures abort the pass.
pub async fn backfill(store: &EventStore, logs_dir: &Path, force: bool) -> Result<BackfillSummary> {
    std::fs::create_dir_all(logs_dir)?;

    let mut summary = BackfillSummary::default();
    for file in scan_legacy_dir(logs_dir)? {
        summary.files_seen += 1;
        match import_file(store, &file, force).await {
            Ok(Some(outcome)) => {
                summary.files_imported += 1;
                summary.rows_inserted += outcome.inserted;
                summary.rows_malformed += outcome.malformed;
            }
            Ok(None) => {
                tracing::trace!("Unchanged: {}", file.path.display());
            }
            Err(Error::Io(err)) => {
                tracing::warn!("Failed to import {}: {err}", file.path.display());
                summary.files_failed += 1;
            }
            Err(err) => return Err(err),
        }
    }

    if summary.files_imported > 0 || summary.files_failed > 0 {
        tracing::info!(
            "Backfill from {}: {} of {} files imported, {} rows inserted, {} malformed, {} failed",
            logs_dir.display(),
            summary.files_imported,
            summary.files_seen,
            summary.rows_inserted,
            summary.rows_malformed,
            summary.files_failed
        );
    }
    Ok(summary)
}

async fn import_file(
    store: &EventStore,
    file: &LegacyFile,
    force: bool,
) -> Result<Option<FileOutcome>> {
    let metadata = std::fs::metadata(&file.path)?;
    let mtime = metadata
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    let size = metadata.len() as i64;
    let source_path = file.path.to_string_lossy().to_string();

    if !force {
        if let Some(entry) = store.get_ledger_entry(&source_path).await? {
            if entry.mtime == mtime && entry.size == size {
                return Ok(None);
            }
        }
    }

    let bytes = std::fs::read(&file.path)?;
    let body = String::from_utf8_lossy(&bytes);
    let (rows, malformed) = parse_legacy_body(file.kind, file.day_t0, &body);

    let inserted = store
        .replace_legacy_import(&LegacyImport {
            source_path,
            rows,
            mtime,
            size,
        })
        .await?;

    Ok(Some(FileOutcome {
        inserted,
        malformed,
    }))
}
