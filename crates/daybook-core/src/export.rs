//! Per-day export pipeline.
//!
//! Turns the raw rows of one day into the payload the timeline front end
//! renders: window samples deduplicated and annotated with inferred idle
//! periods, keystroke buckets collapsed per timestamp, notes, coffee and
//! the journal text. The normalization steps are plain functions over
//! slices so they can be exercised without a store.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backfill::{BackfillSummary, backfill};
use crate::day::{day_end, in_day};
use crate::db::EventStore;
use crate::error::Result;
use crate::models::{CoffeeEvent, IDLE_MARKER, KeyfreqEvent, NoteEvent, WindowEvent};

/// Default gap after which an idle period is inferred.
pub const DEFAULT_IDLE_GAP_SECS: i64 = 1200;

/// A timestamped text sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPoint {
    pub t: i64,
    pub s: String,
}

/// A timestamped keystroke count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountPoint {
    pub t: i64,
    pub s: i64,
}

/// A timestamped coffee dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoffeePoint {
    pub t: i64,
    pub mg: i64,
}

/// Normalized payload of one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayExport {
    pub window_events: Vec<TextPoint>,
    pub keyfreq_events: Vec<CountPoint>,
    pub notes_events: Vec<TextPoint>,
    pub coffee_events: Vec<CoffeePoint>,
    pub blog: String,
}

/// One line of the index of available days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub t0: i64,
    pub t1: i64,
    pub fname: String,
}

/// A day's payload together with the file name it is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayPayload {
    pub day_t0: i64,
    pub fname: String,
    pub export: DayExport,
}

/// Result of exporting every day in the store.
#[derive(Debug, Clone, Default)]
pub struct ExportBundle {
    pub backfill: BackfillSummary,
    pub days: Vec<DayPayload>,
    pub manifest: Vec<ManifestEntry>,
}

/// Knobs of the export pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Gap in seconds after which an idle marker is inserted. Zero or less
    /// disables idle inference.
    pub idle_gap_secs: i64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            idle_gap_secs: DEFAULT_IDLE_GAP_SECS,
        }
    }
}

/// File name a day's payload is published under.
pub fn export_file_name(day_t0: i64) -> String {
    format!("events_{day_t0}.json")
}

// =============================================================================
// Normalization
// =============================================================================

/// Window samples of a day: in-window, sorted, adjacent duplicates
/// collapsed, idle periods inferred.
pub fn normalize_window(day_t0: i64, events: &[WindowEvent], idle_gap_secs: i64) -> Vec<TextPoint> {
    let mut points: Vec<TextPoint> = events
        .iter()
        .filter(|event| in_day(day_t0, event.t))
        .map(|event| TextPoint {
            t: event.t,
            s: event.text.clone(),
        })
        .collect();
    points.sort_by_key(|point| point.t);
    points.dedup();
    infer_idle(points, idle_gap_secs)
}

/// Insert an idle marker `idle_gap_secs` after any sample that is followed
/// by a longer silence, unless that sample already is an idle marker.
///
/// `points` must be sorted by `t`.
pub fn infer_idle(points: Vec<TextPoint>, idle_gap_secs: i64) -> Vec<TextPoint> {
    if idle_gap_secs <= 0 {
        return points;
    }

    points
        .into_iter()
        .fold(Vec::new(), |mut out: Vec<TextPoint>, next| {
            if let Some(prev) = out.last() {
                let idle_t = prev.t.saturating_add(idle_gap_secs);
                if prev.s != IDLE_MARKER && idle_t < next.t {
                    out.push(TextPoint {
                        t: idle_t,
                        s: IDLE_MARKER.to_string(),
                    });
                }
            }
            out.push(next);
            out
        })
}

/// Keystroke buckets of a day: one entry per timestamp holding the largest
/// count seen for it.
pub fn normalize_keyfreq(day_t0: i64, events: &[KeyfreqEvent]) -> Vec<CountPoint> {
    let mut by_t: BTreeMap<i64, i64> = BTreeMap::new();
    for event in events {
        if !in_day(day_t0, event.t) || event.count < 0 {
            continue;
        }
        by_t.entry(event.t)
            .and_modify(|count| *count = (*count).max(event.count))
            .or_insert(event.count);
    }
    by_t.into_iter().map(|(t, s)| CountPoint { t, s }).collect()
}

/// Notes of a day: in-window, sorted, empty and exact adjacent duplicates
/// removed. Distinct notes sharing a timestamp are all kept.
pub fn normalize_notes(day_t0: i64, events: &[NoteEvent]) -> Vec<TextPoint> {
    let mut points: Vec<TextPoint> = events
        .iter()
        .filter(|event| in_day(day_t0, event.t) && !event.text.trim().is_empty())
        .map(|event| TextPoint {
            t: event.t,
            s: event.text.clone(),
        })
        .collect();
    points.sort_by_key(|point| point.t);
    points.dedup();
    points
}

/// Coffee events of a day, in-window and sorted.
pub fn normalize_coffee(day_t0: i64, events: &[CoffeeEvent]) -> Vec<CoffeePoint> {
    let mut points: Vec<CoffeePoint> = events
        .iter()
        .filter(|event| in_day(day_t0, event.t))
        .map(|event| CoffeePoint {
            t: event.t,
            mg: event.milligrams,
        })
        .collect();
    points.sort_by_key(|point| point.t);
    points
}

// =============================================================================
// Store-backed export
// =============================================================================

/// Build the payload of one day.
pub async fn export_day(store: &EventStore, day_t0: i64, options: ExportOptions) -> Result<DayExport> {
    let (window, keyfreq, notes, coffee, blog) = tokio::try_join!(
        store.fetch_window_events(day_t0),
        store.fetch_keyfreq_events(day_t0),
        store.fetch_notes_events(day_t0),
        store.fetch_coffee_events(day_t0),
        store.get_blog_entry(day_t0),
    )?;

    Ok(DayExport {
        window_events: normalize_window(day_t0, &window, options.idle_gap_secs),
        keyfreq_events: normalize_keyfreq(day_t0, &keyfreq),
        notes_events: normalize_notes(day_t0, &notes),
        coffee_events: normalize_coffee(day_t0, &coffee),
        blog,
    })
}

/// Bring legacy logs up to date, then export every day that has data.
pub async fn export_all(
    store: &EventStore,
    logs_dir: &Path,
    options: ExportOptions,
) -> Result<ExportBundle> {
    let summary = backfill(store, logs_dir, false).await?;

    let mut bundle = ExportBundle {
        backfill: summary,
        ..ExportBundle::default()
    };
    for day_t0 in store.list_day_timestamps().await? {
        let fname = export_file_name(day_t0);
        let export = export_day(store, day_t0, options).await?;
        bundle.manifest.push(ManifestEntry {
            t0: day_t0,
            t1: day_end(day_t0),
            fname: fname.clone(),
        });
        bundle.days.push(DayPayload {
            day_t0,
            fname,
            export,
        });
    }

    tracing::debug!("Exported {} days", bundle.days.len());
    Ok(bundle)
}
