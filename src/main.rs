use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use harvest::config::Config;
use harvest::feed::Ingestor;
use harvest::storage::{Database, DatabaseError};
use harvest::{refresh_all, refresh_feeds, subscribe, RefreshSummary};

/// Get the config directory path (~/.config/harvest/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("harvest"))
}

#[derive(Parser, Debug)]
#[command(name = "harvest", version, about = "RSS/Atom feed aggregator")]
struct Args {
    /// Config file (default: ~/.config/harvest/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding the config file
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    /// Print listings as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed, or to the feed advertised by a web page
    Add { url: String },
    /// List subscribed feeds with unread counts
    List,
    /// List entries of a feed, newest first
    Entries {
        feed_id: i64,
        /// Only unread entries
        #[arg(long)]
        unread: bool,
    },
    /// Fetch new entries for all feeds, or for one
    Refresh {
        /// Concurrent fetches (default: `workers` from config)
        #[arg(long)]
        workers: Option<usize>,
        /// Refresh only this feed
        #[arg(long, value_name = "ID")]
        feed: Option<i64>,
    },
    /// Refresh all feeds periodically until interrupted
    Watch {
        /// Minutes between cycles (default: `refresh_interval_minutes` from config)
        #[arg(long, value_name = "MINUTES")]
        interval: Option<u64>,
    },
    /// Unsubscribe from a feed and delete its entries
    Remove { feed_id: i64 },
    /// Mark an entry as read
    Read { entry_id: i64 },
    /// Mark all entries of a feed as read
    ReadFeed { feed_id: i64 },
    /// Mark every entry as read
    ReadAll,
    /// Delete a single entry
    DeleteEntry { entry_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = args
        .database
        .clone()
        .unwrap_or_else(|| config.database_path_for(&config_path));
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let ingestor =
        Ingestor::new(config.fetch_options()).context("Failed to create HTTP client")?;

    match args.command {
        Command::Add { url } => {
            let sub = subscribe(&db, &ingestor, &url)
                .await
                .with_context(|| format!("Failed to subscribe to {url}"))?;
            if args.json {
                print_json(&sub)?;
            } else {
                println!(
                    "Subscribed to \"{}\" ({}) with {} entries [id {}]",
                    sub.feed.title, sub.feed.feed_url, sub.entries, sub.feed.id
                );
            }
        }
        Command::List => {
            let feeds = db
                .feeds_with_unread_counts()
                .await
                .context("Failed to load feeds")?;
            if args.json {
                print_json(&feeds)?;
            } else if feeds.is_empty() {
                println!("No feeds. Add one with: harvest add <URL>");
            } else {
                for o in &feeds {
                    println!(
                        "{:>5}  {:<40}  {:>4} unread  {}",
                        o.feed.id, o.feed.title, o.unread_count, o.feed.feed_url
                    );
                }
            }
        }
        Command::Entries { feed_id, unread } => {
            let entries = db
                .get_feed_entries(feed_id, unread)
                .await
                .context("Failed to load entries")?;
            if args.json {
                print_json(&entries)?;
            } else {
                for e in &entries {
                    let marker = if e.read { ' ' } else { '*' };
                    println!(
                        "{:>6} {} {}  {}  {}",
                        e.id, marker, e.published_at, e.title, e.external_url
                    );
                }
            }
        }
        Command::Refresh { workers, feed } => {
            let workers = workers.unwrap_or(config.workers);
            let summary = match feed {
                Some(feed_id) => {
                    let feed = db.get_feed(feed_id).await.context("Failed to load feed")?;
                    refresh_feeds(&db, &ingestor, vec![feed], workers).await
                }
                None => refresh_all(&db, &ingestor, workers)
                    .await
                    .context("Refresh failed")?,
            };
            print_summary(&summary, args.json)?;
        }
        Command::Watch { interval } => {
            let minutes = interval.unwrap_or(config.refresh_interval_minutes);
            if minutes == 0 {
                anyhow::bail!(
                    "No refresh interval: pass --interval or set refresh_interval_minutes in {}",
                    config_path.display()
                );
            }
            let period = Duration::from_secs(minutes * 60);
            tracing::info!(minutes = minutes, "Watching feeds");
            loop {
                match refresh_all(&db, &ingestor, config.workers).await {
                    Ok(summary) => print_summary(&summary, args.json)?,
                    Err(e) => tracing::error!(error = %e, "Refresh cycle failed"),
                }
                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted, stopping");
                        break;
                    }
                }
            }
        }
        Command::Remove { feed_id } => {
            db.delete_feed(feed_id)
                .await
                .context("Failed to remove feed")?;
            println!("Removed feed {feed_id}");
        }
        Command::Read { entry_id } => {
            let changed = db
                .mark_entry_read(entry_id)
                .await
                .context("Failed to mark entry read")?;
            if !changed {
                // Distinguish "already read" from "no such entry"
                db.get_entry(entry_id).await.context("Failed to mark entry read")?;
            }
            println!("Marked entry {entry_id} as read");
        }
        Command::ReadFeed { feed_id } => {
            db.get_feed(feed_id).await.context("Failed to load feed")?;
            let count = db
                .mark_feed_read(feed_id)
                .await
                .context("Failed to mark feed read")?;
            println!("Marked {count} entries as read");
        }
        Command::ReadAll => {
            let count = db.mark_all_read().await.context("Failed to mark all read")?;
            println!("Marked {count} entries as read");
        }
        Command::DeleteEntry { entry_id } => {
            db.delete_entry(entry_id)
                .await
                .context("Failed to delete entry")?;
            println!("Deleted entry {entry_id}");
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn print_summary(summary: &RefreshSummary, json: bool) -> Result<()> {
    if json {
        return print_json(summary);
    }
    println!(
        "Refreshed {} feeds: {} new entries, {} failed",
        summary.success_count, summary.new_entries, summary.error_count
    );
    Ok(())
}
