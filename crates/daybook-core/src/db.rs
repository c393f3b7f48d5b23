//! Event store for daybook.

use crate::backfill::{LegacyImport, LegacyRow, LegacyRows};
use crate::day::{self, day_start};
use crate::error::{Error, Result};
use crate::models::*;
use crate::schema::SCHEMA;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;

/// Durable store for all event kinds and the legacy import ledger.
///
/// Every mutating call runs under a single write lock owned by the store,
/// so writers never interleave. Reads go straight to the pool and see
/// either the state before or after any in-flight write.
pub struct EventStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl EventStore {
    /// Open or create a store at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        let parent = path.parent().unwrap_or(Path::new("."));
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        store.init().await?;
        Ok(store)
    }

    /// Initialize schema.
    async fn init(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Close the store.
    pub async fn close(self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Live inserts
    // =========================================================================

    /// Append a focused-window sample.
    pub async fn insert_window_event(&self, t: i64, text: &str) -> Result<i64> {
        let day_t0 = day_start(t)?;
        let text = sanitize_text(text);

        let _guard = self.write_lock.lock().await;
        let result =
            sqlx::query("INSERT INTO window_events (t, day_t0, s, source_path) VALUES (?, ?, ?, NULL)")
                .bind(t)
                .bind(day_t0)
                .bind(&text)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Append a keystroke bucket. Negative counts are stored as zero.
    pub async fn insert_keyfreq_event(&self, t: i64, count: i64) -> Result<i64> {
        let day_t0 = day_start(t)?;
        let count = count.max(0);

        let _guard = self.write_lock.lock().await;
        let result = sqlx::query(
            "INSERT INTO keyfreq_events (t, day_t0, s, source_path) VALUES (?, ?, ?, NULL)",
        )
        .bind(t)
        .bind(day_t0)
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Append a note, timestamped now unless `t` is given.
    pub async fn insert_note_event(&self, text: &str, t: Option<i64>) -> Result<i64> {
        let t = t.unwrap_or_else(day::now);
        let day_t0 = day_start(t)?;
        let text = sanitize_text(text);

        let _guard = self.write_lock.lock().await;
        let result =
            sqlx::query("INSERT INTO notes_events (t, day_t0, s, source_path) VALUES (?, ?, ?, NULL)")
                .bind(t)
                .bind(day_t0)
                .bind(&text)
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Replace or create the journal entry of a day.
    ///
    /// `day_t0` must be a day start as returned by [`day_start`].
    pub async fn upsert_blog_entry(&self, day_t0: i64, text: &str) -> Result<()> {
        if day_start(day_t0)? != day_t0 {
            return Err(Error::InvalidTimestamp(format!(
                "{day_t0} is not the start of a day"
            )));
        }

        let _guard = self.write_lock.lock().await;
        sqlx::query(
            r#"
            INSERT INTO blog_entries (day_t0, post, updated_at, source_path)
            VALUES (?, ?, ?, NULL)
            ON CONFLICT(day_t0) DO UPDATE SET
                post = excluded.post,
                updated_at = excluded.updated_at,
                source_path = NULL
            "#,
        )
        .bind(day_t0)
        .bind(text)
        .bind(day::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replace or create the journal entry of the day containing `t`.
    pub async fn upsert_blog_for_timestamp(&self, t: i64, text: &str) -> Result<()> {
        self.upsert_blog_entry(day_start(t)?, text).await
    }

    /// Append a coffee event.
    ///
    /// Fails with [`Error::QuotaExceeded`] once the day already holds
    /// [`COFFEE_DAILY_LIMIT`] events. The check and the insert share one
    /// transaction.
    pub async fn insert_coffee_event(&self, t: i64, milligrams: i64) -> Result<i64> {
        let day_t0 = day_start(t)?;
        if milligrams < 0 {
            return Err(Error::InvalidInput(format!(
                "coffee milligrams must be non-negative, got {milligrams}"
            )));
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coffee_events WHERE day_t0 = ?")
            .bind(day_t0)
            .fetch_one(&mut *tx)
            .await?;
        if existing.0 >= COFFEE_DAILY_LIMIT {
            tx.rollback().await?;
            return Err(Error::QuotaExceeded {
                day_t0,
                limit: COFFEE_DAILY_LIMIT,
            });
        }

        let result = sqlx::query("INSERT INTO coffee_events (t, day_t0, mg) VALUES (?, ?, ?)")
            .bind(t)
            .bind(day_t0)
            .bind(milligrams)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    // =========================================================================
    // Per-day reads
    // =========================================================================

    /// Window events of a day, ordered by `(t, id)`.
    pub async fn fetch_window_events(&self, day_t0: i64) -> Result<Vec<WindowEvent>> {
        let rows = sqlx::query(
            "SELECT id, t, day_t0, s, source_path FROM window_events WHERE day_t0 = ? ORDER BY t ASC, id ASC",
        )
        .bind(day_t0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(window_event_from_row).collect())
    }

    /// Keystroke buckets of a day, ordered by `(t, id)`.
    pub async fn fetch_keyfreq_events(&self, day_t0: i64) -> Result<Vec<KeyfreqEvent>> {
        let rows = sqlx::query(
            "SELECT id, t, day_t0, s, source_path FROM keyfreq_events WHERE day_t0 = ? ORDER BY t ASC, id ASC",
        )
        .bind(day_t0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(keyfreq_event_from_row).collect())
    }

    /// Notes of a day, ordered by `(t, id)`.
    pub async fn fetch_notes_events(&self, day_t0: i64) -> Result<Vec<NoteEvent>> {
        let rows = sqlx::query(
            "SELECT id, t, day_t0, s, source_path FROM notes_events WHERE day_t0 = ? ORDER BY t ASC, id ASC",
        )
        .bind(day_t0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(note_event_from_row).collect())
    }

    /// Coffee events of a day, ordered by `(t, id)`.
    pub async fn fetch_coffee_events(&self, day_t0: i64) -> Result<Vec<CoffeeEvent>> {
        let rows = sqlx::query(
            "SELECT id, t, day_t0, mg FROM coffee_events WHERE day_t0 = ? ORDER BY t ASC, id ASC",
        )
        .bind(day_t0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CoffeeEvent {
                id: row.get("id"),
                t: row.get("t"),
                day_t0: row.get("day_t0"),
                milligrams: row.get("mg"),
            })
            .collect())
    }

    /// Journal text of a day, or an empty string when there is none.
    pub async fn get_blog_entry(&self, day_t0: i64) -> Result<String> {
        Ok(self
            .get_blog(day_t0)
            .await?
            .map(|entry| entry.text)
            .unwrap_or_default())
    }

    /// Full journal row of a day.
    pub async fn get_blog(&self, day_t0: i64) -> Result<Option<BlogEntry>> {
        let row = sqlx::query(
            "SELECT day_t0, post, updated_at, source_path FROM blog_entries WHERE day_t0 = ?",
        )
        .bind(day_t0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| BlogEntry {
            day_t0: row.get("day_t0"),
            text: row.get("post"),
            updated_at: row.get("updated_at"),
            source_path: row.get("source_path"),
        }))
    }

    /// Every day boundary that has at least one row in any table, ascending.
    pub async fn list_day_timestamps(&self) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            r#"
            SELECT day_t0 FROM window_events
            UNION
            SELECT day_t0 FROM keyfreq_events
            UNION
            SELECT day_t0 FROM notes_events
            UNION
            SELECT day_t0 FROM blog_entries
            UNION
            SELECT day_t0 FROM coffee_events
            ORDER BY day_t0 ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get::<i64, _>("day_t0")).collect())
    }

    /// Row counts per table.
    pub async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM window_events) AS window_events,
                (SELECT COUNT(*) FROM keyfreq_events) AS keyfreq_events,
                (SELECT COUNT(*) FROM notes_events) AS notes_events,
                (SELECT COUNT(*) FROM blog_entries) AS blog_entries,
                (SELECT COUNT(*) FROM coffee_events) AS coffee_events,
                (SELECT COUNT(*) FROM legacy_import_state) AS ledger_entries
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(StoreStats {
            window_events: row.get("window_events"),
            keyfreq_events: row.get("keyfreq_events"),
            notes_events: row.get("notes_events"),
            blog_entries: row.get("blog_entries"),
            coffee_events: row.get("coffee_events"),
            ledger_entries: row.get("ledger_entries"),
        })
    }

    // =========================================================================
    // Legacy import ledger
    // =========================================================================

    /// Ledger entry for a legacy file, if it was ever imported.
    pub async fn get_ledger_entry(&self, source_path: &str) -> Result<Option<LedgerEntry>> {
        let row = sqlx::query(
            "SELECT source_path, mtime, size, imported_at FROM legacy_import_state WHERE source_path = ?",
        )
        .bind(source_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(ledger_entry_from_row))
    }

    /// All ledger entries ordered by path.
    pub async fn list_ledger(&self) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            "SELECT source_path, mtime, size, imported_at FROM legacy_import_state ORDER BY source_path",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(ledger_entry_from_row).collect())
    }

    /// Replace everything previously imported from one legacy file.
    ///
    /// Retraction of the old rows, insertion of the new ones and the ledger
    /// update commit together. Returns the number of rows written.
    pub(crate) async fn replace_legacy_import(&self, import: &LegacyImport) -> Result<u64> {
        let kind = import.rows.kind();
        let source_path = import.source_path.as_str();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let delete_sql = format!("DELETE FROM {} WHERE source_path = ?", kind.table_name());
        let retracted = sqlx::query(&delete_sql)
            .bind(source_path)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let inserted = match &import.rows {
            LegacyRows::Window(rows) => {
                insert_tagged_text(&mut tx, "window_events", rows, source_path).await?
            }
            LegacyRows::Notes(rows) => {
                insert_tagged_text(&mut tx, "notes_events", rows, source_path).await?
            }
            LegacyRows::Keyfreq(rows) => {
                for row in rows {
                    sqlx::query(
                        "INSERT INTO keyfreq_events (t, day_t0, s, source_path) VALUES (?, ?, ?, ?)",
                    )
                    .bind(row.t)
                    .bind(row.day_t0)
                    .bind(row.value)
                    .bind(source_path)
                    .execute(&mut *tx)
                    .await?;
                }
                rows.len() as u64
            }
            LegacyRows::Blog(post) => {
                sqlx::query(
                    r#"
                    INSERT INTO blog_entries (day_t0, post, updated_at, source_path)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(day_t0) DO UPDATE SET
                        post = excluded.post,
                        updated_at = excluded.updated_at,
                        source_path = excluded.source_path
                    "#,
                )
                .bind(post.day_t0)
                .bind(&post.value)
                .bind(day::now())
                .bind(source_path)
                .execute(&mut *tx)
                .await?;
                1
            }
        };

        sqlx::query(
            r#"
            INSERT INTO legacy_import_state (source_path, mtime, size, imported_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(source_path) DO UPDATE SET
                mtime = excluded.mtime,
                size = excluded.size,
                imported_at = excluded.imported_at
            "#,
        )
        .bind(source_path)
        .bind(import.mtime)
        .bind(import.size)
        .bind(day::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "Replaced {kind} import {source_path}: retracted {retracted}, inserted {inserted}"
        );
        Ok(inserted)
    }
}

async fn insert_tagged_text(
    conn: &mut SqliteConnection,
    table: &str,
    rows: &[LegacyRow<String>],
    source_path: &str,
) -> Result<u64> {
    let sql = format!("INSERT INTO {table} (t, day_t0, s, source_path) VALUES (?, ?, ?, ?)");
    for row in rows {
        sqlx::query(&sql)
            .bind(row.t)
            .bind(row.day_t0)
            .bind(&row.value)
            .bind(source_path)
            .execute(&mut *conn)
            .await?;
    }
    Ok(rows.len() as u64)
}

fn window_event_from_row(row: &SqliteRow) -> WindowEvent {
    WindowEvent {
        id: row.get("id"),
        t: row.get("t"),
        day_t0: row.get("day_t0"),
        text: row.get("s"),
        source_path: row.get("source_path"),
    }
}

fn keyfreq_event_from_row(row: &SqliteRow) -> KeyfreqEvent {
    KeyfreqEvent {
        id: row.get("id"),
        t: row.get("t"),
        day_t0: row.get("day_t0"),
        count: row.get("s"),
        source_path: row.get("source_path"),
    }
}

fn note_event_from_row(row: &SqliteRow) -> NoteEvent {
    NoteEvent {
        id: row.get("id"),
        t: row.get("t"),
        day_t0: row.get("day_t0"),
        text: row.get("s"),
        source_path: row.get("source_path"),
    }
}

fn ledger_entry_from_row(row: &SqliteRow) -> LedgerEntry {
    LedgerEntry {
        source_path: row.get("source_path"),
        mtime: row.get("mtime"),
        size: row.get("size"),
        imported_at: row.get("imported_at"),
    }
}
