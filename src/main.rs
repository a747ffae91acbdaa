//! clipkeep - clipboard history keeper
//!
//! Watches the system clipboard, keeps a deduplicated most-recent-first
//! history of copied text, and lets you search, re-copy, delete or clear it
//! from a terminal UI or from one-shot commands.

mod app;
mod config;
mod models;
mod screens;
mod services;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::services::storage::MemoryStorage;
use crate::services::{
    copy_entry, ClipboardAccess, ClipboardMonitor, HistoryStore, MemoryClipboard, SqliteStorage,
    SystemClipboard, Theme,
};

/// clipkeep - Clipboard history keeper
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Config file path (default: ~/.config/clipkeep/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// History database path (overrides the config file)
    #[arg(long)]
    db: Option<String>,

    /// Command to run; opens the interactive browser when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the history, most recent first
    List {
        /// Only show entries containing this text (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,

        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Put the entry at INDEX back on the clipboard
    Copy { index: usize },
    /// Delete the entry at INDEX
    Delete { index: usize },
    /// Delete every entry
    Clear {
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Record clipboard changes in the background without the browser
    Watch,
}

impl Command {
    /// Whether the command must refuse to run on a throwaway history.
    fn needs_durable_history(&self) -> bool {
        !matches!(self, Command::Watch)
    }
}

/// Set up logging. The browser owns the terminal, so it logs to a file.
fn init_logging(debug: bool, to_file: bool) -> Result<()> {
    let filter = if debug {
        "clipkeep=debug,info"
    } else {
        "clipkeep=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if to_file {
        let dir = Config::data_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let log_path = dir.join("clipkeep.log");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

/// Open the history store.
///
/// With `strict`, an unusable database is an error. Otherwise the history
/// falls back to memory so clipboard capture keeps working for this run.
fn open_store(config: &Config, strict: bool) -> Result<Arc<HistoryStore>> {
    let path = config.database_path();
    match SqliteStorage::open(&path) {
        Ok(storage) => {
            info!("Using history database {}", path.display());
            Ok(Arc::new(HistoryStore::open(storage)))
        }
        Err(e) if !strict => {
            warn!(
                "Failed to open {}: {}; history will not be saved",
                path.display(),
                e
            );
            Ok(Arc::new(HistoryStore::open(MemoryStorage::new())))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to open {}", path.display())),
    }
}

/// Pick the clipboard implementation for this session.
fn open_clipboard() -> Arc<dyn ClipboardAccess> {
    match SystemClipboard::connect() {
        Ok(clipboard) => Arc::new(clipboard),
        Err(e) => {
            warn!("{}; using a private in-process clipboard", e);
            Arc::new(MemoryClipboard::new())
        }
    }
}

/// Print history rows as `index  text`, indices referring to the full list.
fn list(store: &HistoryStore, config: &Config, search: Option<&str>, limit: Option<usize>) {
    let matches = store.search(search.unwrap_or(""));
    let limit = limit.unwrap_or(usize::MAX);

    if matches.is_empty() {
        eprintln!("No clipboard history");
        return;
    }

    for (index, entry) in matches.into_iter().take(limit) {
        println!("{:>3}  {}", index, entry.display_line(config.display.item_width));
    }
}

/// Ask on stdin; anything but y/yes is a no.
fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Run the monitor until Ctrl+C, echoing each newly recorded entry.
async fn watch(store: Arc<HistoryStore>, config: &Config) -> Result<()> {
    let clipboard = open_clipboard();
    let monitor = Arc::new(ClipboardMonitor::new(clipboard, store.clone()));
    let _monitor = monitor.spawn();

    let width = config.display.item_width;
    let latest = store.clone();
    let _listener = store.notifier().listen(move || {
        if let Some(entry) = latest.get(0) {
            println!("{}", entry.display_line(width));
        }
    });

    info!("Watching clipboard; press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Stopped watching clipboard");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    init_logging(args.debug, args.command.is_none())?;

    // Load configuration
    let mut config = if let Some(path) = args.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    // Override database if specified
    if let Some(db) = args.db {
        config.storage.database = db;
    }

    let strict = args
        .command
        .as_ref()
        .is_some_and(Command::needs_durable_history);
    let store = open_store(&config, strict)?;

    match args.command {
        None => {
            let clipboard = open_clipboard();
            let monitor = Arc::new(ClipboardMonitor::new(clipboard.clone(), store.clone()));
            let _polling = monitor.clone().spawn();

            // Run the TUI application
            let theme = Arc::new(Theme::load());
            let mut app = app::App::new(config, store, clipboard, monitor, theme);
            app.run().await?;
        }
        Some(Command::List { search, limit }) => {
            list(&store, &config, search.as_deref(), limit);
        }
        Some(Command::Copy { index }) => {
            let clipboard = SystemClipboard::connect_for_handoff()?;
            let entry = copy_entry(&store, &clipboard, index)?;
            println!("Copied: {}", entry.display_line(config.display.item_width));
        }
        Some(Command::Delete { index }) => {
            let entry = store.delete_at(index)?;
            println!("Deleted: {}", entry.display_line(config.display.item_width));
        }
        Some(Command::Clear { yes }) => {
            let count = store.len();
            if store.is_empty() {
                println!("History is already empty");
            } else if yes || confirm(&format!("Clear all {} clipboard entries?", count))? {
                store.clear();
                println!("Cleared {} entries", count);
            }
        }
        Some(Command::Watch) => {
            watch(store, &config).await?;
        }
    }

    Ok(())
}
