//! daybook CLI - day-bounded personal activity log

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use daybook_core::backfill::backfill;
use daybook_core::day::{self, day_start};
use daybook_core::export::{export_all, export_day};
use daybook_core::{Config, EventStore};
use tokio::time::{Duration, MissedTickBehavior, interval};

mod render;

#[derive(Debug, Parser)]
#[command(
    name = "daybook",
    author,
    version,
    about = "Personal activity log with 07:00 day boundaries",
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import legacy per-day log files
    Migrate {
        /// Re-import every file even if it looks unchanged
        #[arg(long)]
        force: bool,
    },

    /// Export every day with data as JSON
    Export {
        /// Output directory (defaults to render_dir from the config)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Export periodically until interrupted
    Run,

    /// Record the focused window title
    Window {
        text: String,

        /// Unix timestamp (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Record a keystroke count
    Keys {
        #[arg(allow_negative_numbers = true)]
        count: i64,

        /// Unix timestamp (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Record a note
    Note {
        text: String,

        /// Unix timestamp (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Replace the journal entry of a day
    Blog {
        text: String,

        /// Any Unix timestamp within the day (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// Record a coffee
    Coffee {
        /// Caffeine in milligrams
        mg: i64,

        /// Unix timestamp (defaults to now)
        #[arg(long)]
        at: Option<i64>,
    },

    /// List days that have data
    Days,

    /// Print the export of one day
    Show {
        /// Day start (any timestamp within the day is accepted)
        day_t0: i64,
    },

    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Open store
    let database = config.database_path();
    let store = EventStore::open(&database)
        .await
        .with_context(|| format!("Failed to open store at {}", database.display()))?;

    let result = match cli.command {
        Command::Migrate { force } => cmd_migrate(&store, &config, force).await,
        Command::Export { out } => cmd_export(&store, &config, out).await,
        Command::Run => cmd_run(&store, &config).await,
        Command::Window { text, at } => cmd_window(&store, &text, at).await,
        Command::Keys { count, at } => cmd_keys(&store, count, at).await,
        Command::Note { text, at } => cmd_note(&store, &text, at).await,
        Command::Blog { text, at } => cmd_blog(&store, &text, at).await,
        Command::Coffee { mg, at } => cmd_coffee(&store, mg, at).await,
        Command::Days => cmd_days(&store).await,
        Command::Show { day_t0 } => cmd_show(&store, &config, day_t0).await,
        Command::Stats => cmd_stats(&store).await,
    };

    store.close().await;
    result
}

async fn cmd_migrate(store: &EventStore, config: &Config, force: bool) -> Result<()> {
    println!("Migrating legacy logs from {}...", config.logs_dir.display());
    let summary = backfill(store, &config.logs_dir, force).await?;

    println!("Files seen:     {}", summary.files_seen);
    println!("Files imported: {}", summary.files_imported);
    println!("Files failed:   {}", summary.files_failed);
    println!("Rows inserted:  {}", summary.rows_inserted);
    println!("Rows malformed: {}", summary.rows_malformed);
    Ok(())
}

async fn cmd_export(store: &EventStore, config: &Config, out: Option<PathBuf>) -> Result<()> {
    let out_dir = out.unwrap_or_else(|| config.render_dir.clone());
    let days = export_once(store, config, &out_dir).await?;
    println!("Exported {days} days to {}", out_dir.display());
    Ok(())
}

async fn export_once(store: &EventStore, config: &Config, out_dir: &Path) -> Result<usize> {
    let bundle = export_all(store, &config.logs_dir, config.export_options()).await?;
    render::write_bundle(out_dir, &bundle)?;
    Ok(bundle.days.len())
}

async fn cmd_run(store: &EventStore, config: &Config) -> Result<()> {
    let period = Duration::from_secs(config.export.interval_secs.max(1));
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        "Exporting to {} every {}s",
        config.render_dir.display(),
        period.as_secs()
    );

    loop {
        tokio::select! {
            _ = tick.tick() => {
                match export_once(store, config, &config.render_dir).await {
                    Ok(days) => tracing::debug!("Export pass wrote {days} days"),
                    Err(err) => {
                        let retriable = err
                            .downcast_ref::<daybook_core::Error>()
                            .is_some_and(daybook_core::Error::is_retriable)
                            || err.downcast_ref::<std::io::Error>().is_some();
                        if !retriable {
                            return Err(err);
                        }
                        tracing::warn!("Export pass failed, retrying next tick: {err:#}");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Export loop shutting down.");
                break;
            }
        }
    }

    Ok(())
}

async fn cmd_window(store: &EventStore, text: &str, at: Option<i64>) -> Result<()> {
    let t = at.unwrap_or_else(day::now);
    store.insert_window_event(t, text).await?;
    println!("Recorded window at {t}");
    Ok(())
}

async fn cmd_keys(store: &EventStore, count: i64, at: Option<i64>) -> Result<()> {
    let t = at.unwrap_or_else(day::now);
    store.insert_keyfreq_event(t, count).await?;
    println!("Recorded {count} keystrokes at {t}");
    Ok(())
}

async fn cmd_note(store: &EventStore, text: &str, at: Option<i64>) -> Result<()> {
    store.insert_note_event(text, at).await?;
    println!("Note saved");
    Ok(())
}

async fn cmd_blog(store: &EventStore, text: &str, at: Option<i64>) -> Result<()> {
    let day_t0 = day_start(at.unwrap_or_else(day::now))?;
    store.upsert_blog_entry(day_t0, text).await?;
    println!("Journal for {} updated", format_day(day_t0));
    Ok(())
}

async fn cmd_coffee(store: &EventStore, mg: i64, at: Option<i64>) -> Result<()> {
    let t = at.unwrap_or_else(day::now);
    store
        .insert_coffee_event(t, mg)
        .await
        .context("Coffee not recorded")?;
    println!("Recorded {mg} mg coffee at {t}");
    Ok(())
}

async fn cmd_days(store: &EventStore) -> Result<()> {
    let days = store.list_day_timestamps().await?;
    if days.is_empty() {
        println!("No days recorded yet.");
        return Ok(());
    }

    for day_t0 in days {
        println!("{day_t0}  {}", format_day(day_t0));
    }
    Ok(())
}

async fn cmd_show(store: &EventStore, config: &Config, t: i64) -> Result<()> {
    let day_t0 = day_start(t)?;
    let export = export_day(store, day_t0, config.export_options()).await?;
    println!("{}", serde_json::to_string_pretty(&export)?);
    Ok(())
}

async fn cmd_stats(store: &EventStore) -> Result<()> {
    let stats = store.stats().await?;

    println!("Store Statistics");
    println!("----------------");
    println!("Window events:  {}", stats.window_events);
    println!("Keyfreq events: {}", stats.keyfreq_events);
    println!("Notes:          {}", stats.notes_events);
    println!("Journal days:   {}", stats.blog_entries);
    println!("Coffee events:  {}", stats.coffee_events);
    println!("Imported files: {}", stats.ledger_entries);
    Ok(())
}

fn format_day(day_t0: i64) -> String {
    DateTime::from_timestamp(day_t0, 0)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| day_t0.to_string())
}
