//! CLI entry point for MindJar.
//!
//! This binary is the composition root: it owns the database handle,
//! wires the stores together, and exposes the app's flows (sign-up,
//! login, journal, videos, session) as subcommands. All invariants
//! live in `mindjar-store`; this layer only renders results.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mindjar_store::{
    AccountStore, CredentialService, Database, JournalStore, MigrationPolicy, SessionStore,
    StoreError, VideoCacheItem, VideoCacheStore,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// MindJar — a local mood-journaling companion.
#[derive(Parser)]
#[command(
    name = "mindjar",
    version,
    about = "MindJar — local mood journaling",
    long_about = "A mood-journaling companion with local accounts, a private journal, \
                  and a small library of calming videos."
)]
struct Cli {
    /// Directory for the database and session files.
    #[arg(long, env = "MINDJAR_DATA_DIR", default_value = "data", global = true)]
    data_dir: PathBuf,

    /// Drop and recreate the schema on any version mismatch.
    ///
    /// All stored accounts and journal entries are lost when this
    /// fires; the login session survives.
    #[arg(long, global = true)]
    destructive_migrations: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Log in with an existing account.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Log out of the current session.
    Logout,

    /// Show who is currently logged in.
    Whoami,

    /// Journal operations for the logged-in account.
    Journal {
        #[command(subcommand)]
        command: JournalCommands,
    },

    /// Video library operations.
    Videos {
        #[command(subcommand)]
        command: VideoCommands,
    },

    /// Show database path, schema version, and session state.
    Status,
}

#[derive(Subcommand)]
enum JournalCommands {
    /// Add a journal entry.
    Add {
        #[arg(long)]
        emotion: String,
        #[arg(long)]
        text: String,
    },
    /// List entries, newest first.
    List,
    /// Show a single entry.
    Show { entry_id: i64 },
    /// Pin an entry.
    Pin { entry_id: i64 },
    /// Unpin an entry.
    Unpin { entry_id: i64 },
}

#[derive(Subcommand)]
enum VideoCommands {
    /// List cached videos in display order.
    List,
    /// Populate the cache with the built-in library if it is empty.
    Seed,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Everything the subcommands need, constructed once at startup.
struct App {
    auth: CredentialService,
    sessions: SessionStore,
    journal: JournalStore,
    videos: VideoCacheStore,
    db: Database,
    db_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("warn");

    let cli = Cli::parse();
    let app = setup(&cli).await?;

    match cli.command {
        Commands::Signup { name, email, password } => cmd_signup(&app, &name, &email, &password).await,
        Commands::Login { email, password } => cmd_login(&app, &email, &password).await,
        Commands::Logout => cmd_logout(&app).await,
        Commands::Whoami => cmd_whoami(&app).await,
        Commands::Journal { command } => cmd_journal(&app, command).await,
        Commands::Videos { command } => cmd_videos(&app, command).await,
        Commands::Status => cmd_status(&app).await,
    }
}

async fn setup(cli: &Cli) -> Result<App> {
    if !cli.data_dir.exists() {
        std::fs::create_dir_all(&cli.data_dir).context("failed to create data directory")?;
    }

    let policy = if cli.destructive_migrations {
        MigrationPolicy::DestructiveRecreate
    } else {
        MigrationPolicy::Incremental
    };

    let db_path = cli.data_dir.join("mindjar.db");
    let db = Database::open_and_migrate(db_path.clone(), policy)
        .await
        .context("failed to open database")?;
    info!(path = %db_path.display(), ?policy, "store initialized");

    Ok(App {
        auth: CredentialService::new(AccountStore::new(db.clone())),
        sessions: SessionStore::new(db.clone(), cli.data_dir.join("session.json")),
        journal: JournalStore::new(db.clone()),
        videos: VideoCacheStore::new(db.clone()),
        db,
        db_path,
    })
}

// ---------------------------------------------------------------------------
// Auth & session flows
// ---------------------------------------------------------------------------

async fn cmd_signup(app: &App, name: &str, email: &str, password: &str) -> Result<()> {
    match app.auth.create_account(name, email, password).await {
        Ok(id) => {
            app.sessions.set_logged_in_account(id).await?;
            println!("Welcome, {name}! You are signed up and logged in.");
            Ok(())
        }
        Err(StoreError::DuplicateEmail { email }) => {
            bail!("an account already exists for {email}")
        }
        Err(StoreError::InvalidInput(msg)) => bail!("{msg}"),
        Err(e) => Err(e).context("sign-up failed"),
    }
}

async fn cmd_login(app: &App, email: &str, password: &str) -> Result<()> {
    // One message for both failure modes; no oracle for which was wrong.
    let Some(account) = app.auth.find_by_email(email).await? else {
        bail!("invalid email or password");
    };
    if !app.auth.verify_password(password, &account.password_hash).await? {
        bail!("invalid email or password");
    }

    app.sessions.set_logged_in_account(account.id).await?;
    println!("Welcome back, {}!", account.full_name);
    Ok(())
}

async fn cmd_logout(app: &App) -> Result<()> {
    app.sessions.clear_session().await?;
    println!("Logged out.");
    Ok(())
}

async fn cmd_whoami(app: &App) -> Result<()> {
    match app.sessions.get_logged_in_account().await? {
        Some(id) => println!("Logged in as account #{id}."),
        None => println!("Not logged in."),
    }
    Ok(())
}

/// The logged-in account id, or an error telling the user to log in.
async fn require_login(app: &App) -> Result<i64> {
    app.sessions
        .get_logged_in_account()
        .await?
        .context("not logged in — run `mindjar login` first")
}

// ---------------------------------------------------------------------------
// Journal flows
// ---------------------------------------------------------------------------

async fn cmd_journal(app: &App, command: JournalCommands) -> Result<()> {
    let account_id = require_login(app).await?;

    match command {
        JournalCommands::Add { emotion, text } => {
            let id = app.journal.add_entry(account_id, &emotion, &text).await?;
            println!("Entry #{id} saved.");
        }
        JournalCommands::List => {
            let entries = app.journal.list_entries(account_id).await?;
            if entries.is_empty() {
                println!("No entries yet.");
                return Ok(());
            }
            for entry in entries {
                let pin = if entry.is_pinned { "*" } else { " " };
                println!(
                    "{pin} #{:<4} {}  [{}]  {}",
                    entry.entry_id,
                    format_timestamp(entry.created_at),
                    entry.emotion,
                    entry.text
                );
            }
        }
        JournalCommands::Show { entry_id } => {
            let entry = fetch_owned_entry(app, account_id, entry_id).await?;
            println!("Entry #{}", entry.entry_id);
            println!("  when:    {}", format_timestamp(entry.created_at));
            println!("  emotion: {}", entry.emotion);
            println!("  pinned:  {}", entry.is_pinned);
            println!("  text:    {}", entry.text);
        }
        JournalCommands::Pin { entry_id } => set_pinned(app, account_id, entry_id, true).await?,
        JournalCommands::Unpin { entry_id } => set_pinned(app, account_id, entry_id, false).await?,
    }
    Ok(())
}

async fn fetch_owned_entry(
    app: &App,
    account_id: i64,
    entry_id: i64,
) -> Result<mindjar_store::JournalEntry> {
    let entry = app
        .journal
        .get_entry(entry_id)
        .await?
        .with_context(|| format!("no entry #{entry_id}"))?;
    if entry.account_id != account_id {
        bail!("no entry #{entry_id}");
    }
    Ok(entry)
}

async fn set_pinned(app: &App, account_id: i64, entry_id: i64, pinned: bool) -> Result<()> {
    let mut entry = fetch_owned_entry(app, account_id, entry_id).await?;
    entry.is_pinned = pinned;

    // A zero update count means the entry vanished between read and
    // write; surface it as not-found rather than ignoring it.
    if app.journal.update_entry(&entry).await? == 0 {
        bail!("no entry #{entry_id}");
    }
    println!(
        "Entry #{entry_id} {}.",
        if pinned { "pinned" } else { "unpinned" }
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Video flows
// ---------------------------------------------------------------------------

/// Built-in library, standing in for the remote metadata source.
fn seed_library() -> Vec<VideoCacheItem> {
    [
        ("5-minute morning check-in", "mj-checkin-01"),
        ("Box breathing basics", "mj-breathe-02"),
        ("Grounding with 5-4-3-2-1", "mj-ground-03"),
        ("Gentle stretching for stress", "mj-stretch-04"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (title, video_id))| VideoCacheItem {
        video_id: video_id.to_string(),
        title: title.to_string(),
        display_order: i as i64 + 1,
    })
    .collect()
}

async fn cmd_videos(app: &App, command: VideoCommands) -> Result<()> {
    match command {
        VideoCommands::List => {
            let videos = app.videos.get_all().await?;
            if videos.is_empty() {
                println!("Video cache is empty — run `mindjar videos seed`.");
                return Ok(());
            }
            for video in videos {
                println!(
                    "{:>3}. {}  ({})",
                    video.display_order,
                    video.title,
                    video.embed_url()
                );
            }
        }
        VideoCommands::Seed => {
            let written = app
                .videos
                .populate_if_empty(|| async { Ok(seed_library()) })
                .await?;
            if written == 0 {
                println!("Video cache already populated.");
            } else {
                println!("Seeded {written} videos.");
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

async fn cmd_status(app: &App) -> Result<()> {
    let version = app
        .db
        .execute(|conn| mindjar_store::migration::current_version(conn))
        .await?;
    let accounts = AccountStore::new(app.db.clone()).count().await?;
    let session = app.sessions.get_logged_in_account().await?;

    println!("MindJar status");
    println!("  database:       {}", app.db_path.display());
    println!(
        "  schema version: {version} (latest {})",
        mindjar_store::migration::latest_version()
    );
    println!("  accounts:       {accounts}");
    match session {
        Some(id) => println!("  session:        account #{id}"),
        None => println!("  session:        none"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn format_timestamp(epoch_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}
