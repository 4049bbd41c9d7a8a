//! Talk call history CLI
//!
//! Inspect the reconstructed call history and manage the video call journal.

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use talk_call_history::config::Config;
use talk_call_history::display::render_row;
use talk_call_history::models::CallHistoryRecord;
use talk_call_history::service::CallHistoryService;
use talk_call_history::store::SqliteStore;
use talk_call_history::tabs::{FilterState, HomeConfig, HomeScreen, TabKind};
use talk_call_history::uri::{classify_link, LinkTarget};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Talk call history - reconstruct and inspect call history
#[derive(Parser)]
#[command(name = "talk-call-history")]
#[command(about = "Inspect call history and the video call journal")]
struct Cli {
    /// Data directory (database and preferences)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Account whose conversations are shown
    #[arg(long, global = true)]
    account: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the local database schema
    Init,

    /// Show the call history, newest first
    History {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show calls currently in progress
    Active {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Mark a call as a video call
    MarkVideo {
        /// Conversation token
        token: String,

        /// Call start (seconds since epoch, defaults to now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Check the journal for a video mark
    Check {
        /// Conversation token
        token: String,

        /// Call timestamp (seconds since epoch)
        timestamp: i64,
    },

    /// Show stored video call marks
    Journal,

    /// Remove all video call marks
    ClearJournal,

    /// Show one home screen tab
    Tab {
        /// chats, groups or calls
        tab: TabKind,

        /// Name filter
        #[arg(short, long)]
        query: Option<String>,

        /// Only unread conversations
        #[arg(long)]
        unread: bool,

        /// Only conversations with mentions
        #[arg(long)]
        mention: bool,
    },

    /// Tell what a link points to on the given server
    Link {
        /// Server base URL
        base_url: String,

        /// Link to classify
        url: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.data_dir {
        Some(dir) => Config::with_data_dir(dir),
        None => Config::default(),
    };
    if let Some(account) = cli.account {
        config.account_id = account;
    }

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::History { json } => cmd_history(&config, json),
        Commands::Active { json } => cmd_active(&config, json),
        Commands::MarkVideo { token, timestamp } => cmd_mark_video(&config, &token, timestamp),
        Commands::Check { token, timestamp } => cmd_check(&config, &token, timestamp),
        Commands::Journal => cmd_journal(&config),
        Commands::ClearJournal => cmd_clear_journal(&config),
        Commands::Tab {
            tab,
            query,
            unread,
            mention,
        } => cmd_tab(&config, tab, query.as_deref(), FilterState { mention, unread }),
        Commands::Link { base_url, url } => cmd_link(&base_url, &url),
    }
}

// ============================================================================
// CLI Commands
// ============================================================================

fn cmd_init(config: &Config) -> anyhow::Result<()> {
    SqliteStore::new(config)
        .initialize()
        .with_context(|| format!("initializing {}", config.messages_db.display()))?;
    println!("Initialized {}", config.messages_db.display());
    Ok(())
}

fn print_records(records: &[CallHistoryRecord], json: bool, empty: &str) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", empty);
        return Ok(());
    }

    let now = Utc::now();
    for record in records {
        println!("{}", render_row(record, now));
    }
    Ok(())
}

fn cmd_history(config: &Config, json: bool) -> anyhow::Result<()> {
    let service = Arc::new(CallHistoryService::open(config));

    let runtime = tokio::runtime::Runtime::new()?;
    let records = runtime.block_on(service.load_history_in_background())?;

    info!(records = records.len(), "Call history loaded");
    print_records(&records, json, "No call history")
}

fn cmd_active(config: &Config, json: bool) -> anyhow::Result<()> {
    let service = CallHistoryService::open(config);
    let records = service.active_calls().context("loading active calls")?;
    print_records(&records, json, "No calls in progress")
}

fn cmd_mark_video(config: &Config, token: &str, timestamp: Option<i64>) -> anyhow::Result<()> {
    let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp());
    let service = CallHistoryService::open(config);
    service.mark_video_call(token, timestamp)?;
    println!("Marked {} at {} as video call", token, timestamp);
    Ok(())
}

fn cmd_check(config: &Config, token: &str, timestamp: i64) -> anyhow::Result<()> {
    let service = CallHistoryService::open(config);
    let journal = service.journal();

    if journal.was_video_call(token, timestamp)? {
        println!("video (exact mark)");
    } else if journal.was_video_call_in_range(token, timestamp, config.video_mark_window_secs)? {
        println!("video (within {}s)", config.video_mark_window_secs);
    } else {
        println!("no video mark");
    }
    Ok(())
}

fn cmd_journal(config: &Config) -> anyhow::Result<()> {
    let service = CallHistoryService::open(config);
    println!("{}", service.journal().debug_info()?);
    Ok(())
}

fn cmd_clear_journal(config: &Config) -> anyhow::Result<()> {
    let service = CallHistoryService::open(config);
    service.journal().clear()?;
    println!("Cleared video call journal");
    Ok(())
}

fn cmd_tab(config: &Config, tab: TabKind, query: Option<&str>, state: FilterState) -> anyhow::Result<()> {
    let service = Arc::new(CallHistoryService::open(config));
    let mut home = HomeScreen::new(HomeConfig::default(), service);

    home.select(tab).context("loading tab")?;
    if let Some(q) = query {
        home.search(q);
    }
    home.set_filter_state(state);

    let rows = home.current().rows(Utc::now());
    if rows.is_empty() {
        println!("Nothing to show");
    }
    for row in rows {
        println!("{}", row);
    }
    Ok(())
}

fn cmd_link(base_url: &str, url: &str) -> anyhow::Result<()> {
    match classify_link(base_url, url)? {
        LinkTarget::TalkRoom(token) => println!("talk room {}", token),
        LinkTarget::FileShare(id) => println!("file share {}", id),
        LinkTarget::File(id) => println!("file {}", id),
        LinkTarget::External => println!("external"),
    }
    Ok(())
}
