//! Integration tests for legacy log backfill.

use std::path::{Path, PathBuf};

use daybook_core::EventStore;
use daybook_core::backfill::{BackfillSummary, backfill, scan_legacy_dir};
use daybook_core::day::day_start;
use daybook_core::models::LegacyKind;
use tempfile::TempDir;

/// Start of the day that legacy fixture files are named after.
fn legacy_day() -> i64 {
    day_start(1_736_550_000).expect("day start")
}

struct Fixture {
    _dir: TempDir,
    logs_dir: PathBuf,
    store: EventStore,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let logs_dir = dir.path().join("logs");
    std::fs::create_dir_all(&logs_dir).expect("logs dir");
    let store = EventStore::open(&dir.path().join("daybook.db"))
        .await
        .expect("open store");
    Fixture {
        _dir: dir,
        logs_dir,
        store,
    }
}

fn write_legacy(logs_dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = logs_dir.join(name);
    std::fs::write(&path, body).expect("write legacy file");
    path
}

/// Window, keyfreq, notes and blog files for `day`, plus files that must be
/// ignored.
fn write_standard_logs(logs_dir: &Path, day: i64) {
    write_legacy(
        logs_dir,
        &format!("window_{day}.txt"),
        &format!(
            "{} VSCode\n{} Browser\ngarbage\n{} OutsideWindow\n",
            day + 1,
            day + 10,
            day + 90_000
        ),
    );
    write_legacy(
        logs_dir,
        &format!("keyfreq_{day}.txt"),
        &format!("{} 5\n{} 12\n{} many\n", day + 2, day + 62, day + 70),
    );
    write_legacy(
        logs_dir,
        &format!("notes_{day}.txt"),
        &format!("{} started the report\n\n{} lunch\n", day + 3, day + 4000),
    );
    write_legacy(logs_dir, &format!("blog_{day}.txt"), "Productive day.\n");
    write_legacy(
        logs_dir,
        &format!("coffee_{day}.txt"),
        &format!("{} 100\n", day + 5),
    );
    write_legacy(logs_dir, "readme.txt", "not a log\n");
    write_legacy(logs_dir, &format!("window_{day}.bak"), "1 stale\n");
}

async fn row_counts(store: &EventStore, day: i64) -> (usize, usize, usize, String) {
    (
        store.fetch_window_events(day).await.expect("window").len(),
        store.fetch_keyfreq_events(day).await.expect("keyfreq").len(),
        store.fetch_notes_events(day).await.expect("notes").len(),
        store.get_blog_entry(day).await.expect("blog"),
    )
}

#[tokio::test]
async fn first_pass_imports_recognized_files() {
    let fx = fixture().await;
    let day = legacy_day();
    write_standard_logs(&fx.logs_dir, day);

    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("backfill");

    assert_eq!(
        summary,
        BackfillSummary {
            files_seen: 4,
            files_imported: 4,
            files_failed: 0,
            rows_inserted: 2 + 2 + 2 + 1,
            rows_malformed: 2,
        }
    );

    let window = fx.store.fetch_window_events(day).await.expect("window");
    let texts: Vec<&str> = window.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["VSCode", "Browser"]);
    for event in &window {
        assert_eq!(event.day_t0, day_start(event.t).expect("day start"));
    }
    let expected_source = fx.logs_dir.join(format!("window_{day}.txt"));
    assert_eq!(
        window[0].source_path.as_deref(),
        Some(expected_source.to_string_lossy().as_ref())
    );

    let keyfreq = fx.store.fetch_keyfreq_events(day).await.expect("keyfreq");
    let counts: Vec<(i64, i64)> = keyfreq.iter().map(|e| (e.t, e.count)).collect();
    assert_eq!(counts, vec![(day + 2, 5), (day + 62, 12)]);

    let blog = fx.store.get_blog(day).await.expect("blog").expect("exists");
    assert_eq!(blog.text, "Productive day.\n");
    assert!(blog.source_path.is_some());

    // Legacy coffee files are not imported.
    assert!(fx.store.fetch_coffee_events(day).await.expect("coffee").is_empty());
}

#[tokio::test]
async fn second_pass_skips_unchanged_files() {
    let fx = fixture().await;
    let day = legacy_day();
    write_standard_logs(&fx.logs_dir, day);

    backfill(&fx.store, &fx.logs_dir, false).await.expect("first");
    let before = row_counts(&fx.store, day).await;
    let ledger_before = fx.store.list_ledger().await.expect("ledger");

    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("second");
    assert_eq!(summary.files_seen, 4);
    assert_eq!(summary.files_imported, 0);
    assert_eq!(summary.rows_inserted, 0);

    assert_eq!(row_counts(&fx.store, day).await, before);
    assert_eq!(fx.store.list_ledger().await.expect("ledger"), ledger_before);
}

#[tokio::test]
async fn forced_passes_converge_without_duplicates() {
    let fx = fixture().await;
    let day = legacy_day();
    write_standard_logs(&fx.logs_dir, day);

    backfill(&fx.store, &fx.logs_dir, true).await.expect("first");
    let first = row_counts(&fx.store, day).await;
    let stats_first = fx.store.stats().await.expect("stats");

    let summary = backfill(&fx.store, &fx.logs_dir, true).await.expect("second");
    assert_eq!(summary.files_imported, 4);

    assert_eq!(row_counts(&fx.store, day).await, first);
    assert_eq!(fx.store.stats().await.expect("stats"), stats_first);
    assert_eq!(first.0, 2);
    assert_eq!(stats_first.ledger_entries, 4);
}

#[tokio::test]
async fn changed_file_replaces_only_its_own_rows() {
    let fx = fixture().await;
    let day = legacy_day();
    write_standard_logs(&fx.logs_dir, day);
    backfill(&fx.store, &fx.logs_dir, false).await.expect("first");

    let notes_before = fx.store.fetch_notes_events(day).await.expect("notes");

    write_legacy(
        &fx.logs_dir,
        &format!("window_{day}.txt"),
        &format!("{} Terminal\n{} Editor\n{} Mail client\n", day + 1, day + 20, day + 30),
    );

    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("second");
    assert_eq!(summary.files_imported, 1);
    assert_eq!(summary.rows_inserted, 3);
    assert_eq!(summary.rows_malformed, 0);

    let texts: Vec<String> = fx
        .store
        .fetch_window_events(day)
        .await
        .expect("window")
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert_eq!(texts, vec!["Terminal", "Editor", "Mail client"]);

    let notes_after = fx.store.fetch_notes_events(day).await.expect("notes");
    assert_eq!(notes_after, notes_before);
}

#[tokio::test]
async fn live_rows_survive_reimport() {
    let fx = fixture().await;
    let day = legacy_day();
    write_standard_logs(&fx.logs_dir, day);
    backfill(&fx.store, &fx.logs_dir, false).await.expect("first");

    let live_t = day + 500;
    let live_day = day_start(live_t).expect("day start");
    fx.store
        .insert_window_event(live_t, "Live window")
        .await
        .expect("live insert");

    backfill(&fx.store, &fx.logs_dir, true).await.expect("forced");

    let live: Vec<_> = fx
        .store
        .fetch_window_events(live_day)
        .await
        .expect("window")
        .into_iter()
        .filter(|e| e.source_path.is_none())
        .collect();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].text, "Live window");
}

#[tokio::test]
async fn emptied_file_retracts_previous_rows() {
    let fx = fixture().await;
    let day = legacy_day();
    let path = write_legacy(
        &fx.logs_dir,
        &format!("notes_{day}.txt"),
        &format!("{} one\n{} two\n", day + 1, day + 2),
    );
    backfill(&fx.store, &fx.logs_dir, false).await.expect("first");
    assert_eq!(fx.store.fetch_notes_events(day).await.expect("notes").len(), 2);

    std::fs::write(&path, "").expect("truncate");
    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("second");
    assert_eq!(summary.files_imported, 1);
    assert_eq!(summary.rows_inserted, 0);
    assert!(fx.store.fetch_notes_events(day).await.expect("notes").is_empty());

    let entry = fx
        .store
        .get_ledger_entry(&path.to_string_lossy())
        .await
        .expect("ledger")
        .expect("exists");
    assert_eq!(entry.size, 0);
}

#[tokio::test]
async fn missing_logs_dir_is_created() {
    let fx = fixture().await;
    let missing = fx.logs_dir.join("nested").join("later");

    let summary = backfill(&fx.store, &missing, false)
        .await
        .expect("backfill");
    assert_eq!(summary, BackfillSummary::default());
    assert!(missing.is_dir());
}

#[tokio::test]
async fn directories_with_log_names_are_skipped() {
    let fx = fixture().await;
    let day = legacy_day();
    std::fs::create_dir(fx.logs_dir.join(format!("window_{day}.txt"))).expect("mkdir");

    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("backfill");
    assert_eq!(summary.files_seen, 0);
}

#[tokio::test]
async fn misnamed_file_rows_land_in_the_day_of_their_timestamp() {
    let fx = fixture().await;
    let day = legacy_day();
    let named = day - 3600;
    write_legacy(
        &fx.logs_dir,
        &format!("window_{named}.txt"),
        &format!("{} Early\n{} Late\n", day - 60, day + 60),
    );
    fx.store
        .insert_window_event(day + 120, "Live window")
        .await
        .expect("live insert");

    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("backfill");
    assert_eq!(summary.rows_inserted, 2);

    let previous = day_start(day - 60).expect("day start");
    assert_eq!(
        fx.store.list_day_timestamps().await.expect("days"),
        vec![previous, day]
    );

    let texts: Vec<String> = fx
        .store
        .fetch_window_events(day)
        .await
        .expect("window")
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert_eq!(texts, vec!["Late", "Live window"]);

    let earlier = fx.store.fetch_window_events(previous).await.expect("window");
    assert_eq!(earlier.len(), 1);
    assert_eq!(earlier[0].text, "Early");
    assert!(fx.store.fetch_window_events(named).await.expect("window").is_empty());
}

#[tokio::test]
async fn names_beyond_the_timestamp_range_are_ignored() {
    let fx = fixture().await;
    write_legacy(&fx.logs_dir, "window_9223372036854775000.txt", "1 Editor\n");
    write_legacy(&fx.logs_dir, "blog_9223372036854775000.txt", "Far future.\n");
    write_legacy(&fx.logs_dir, "notes_9223372036854775807.txt", "1 note\n");

    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("backfill");
    assert_eq!(summary, BackfillSummary::default());
    assert!(fx.store.list_day_timestamps().await.expect("days").is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_log_files_are_imported() {
    let fx = fixture().await;
    let day = legacy_day();
    let outside = fx._dir.path().join("archive");
    std::fs::create_dir_all(&outside).expect("archive dir");
    let target = write_legacy(&outside, "saved.txt", &format!("{} linked note\n", day + 5));
    std::os::unix::fs::symlink(&target, fx.logs_dir.join(format!("notes_{day}.txt")))
        .expect("symlink");

    let summary = backfill(&fx.store, &fx.logs_dir, false)
        .await
        .expect("backfill");
    assert_eq!(summary.files_imported, 1);

    let notes = fx.store.fetch_notes_events(day).await.expect("notes");
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].text, "linked note");
}

#[test]
fn scan_lists_recognized_files_in_path_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let day = legacy_day();
    write_standard_logs(dir.path(), day);

    let files = scan_legacy_dir(dir.path()).expect("scan");
    let kinds: Vec<LegacyKind> = files.iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LegacyKind::Blog,
            LegacyKind::Keyfreq,
            LegacyKind::Notes,
            LegacyKind::Window
        ]
    );
    assert!(files.iter().all(|f| f.day_t0 == day && f.path.is_absolute()));
}
