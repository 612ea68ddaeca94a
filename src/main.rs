use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::prelude::*;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

mod config;
mod error;
mod service;
mod storage;
mod tui;

use config::Config;
use service::NoteService;
use service::codeforces::CodeforcesClient;
use service::query::FilterCriteria;
use service::resolver::Resolver;
use storage::kv::FileStore;
use tui::app::App;

#[derive(Parser)]
#[command(name = "cfnotes")]
#[command(about = "Notes for competitive programming problems")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the terminal UI (default)
    Tui,

    /// Write a dated JSON backup of every note
    Export {
        /// Directory to write the backup into (defaults to the current directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Merge notes from a JSON backup
    Import {
        /// Backup file to read
        file: PathBuf,
    },

    /// Print notes, optionally filtered
    List {
        /// Free-text search over link, notes, name and tags
        #[arg(short, long, default_value = "")]
        search: String,

        /// Exact rating
        #[arg(short, long, default_value = "")]
        rating: String,

        /// Comma-separated tags; every one must match
        #[arg(short, long, default_value = "")]
        tags: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let _log_guard = init_tracing(&config)?;

    let provider = CodeforcesClient::new(config.api_base.clone(), config.http_timeout)
        .context("Failed to build HTTP client")?;
    let store = FileStore::new(&config.data_dir);
    tracing::info!(data_dir = %store.dir().display(), "starting cfnotes");
    let mut service = NoteService::load(Arc::new(store), Resolver::new(Arc::new(provider)))
        .await
        .with_context(|| format!("Failed to load notes from {}", config.data_dir.display()))?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => run_tui(service).await,
        Commands::Export { dir } => {
            let dir = match dir {
                Some(dir) => dir,
                None => std::env::current_dir()?,
            };
            let path = service.export_to_dir(&dir).await?;
            println!("Exported {} notes to {}", service.notes().len(), path.display());
            Ok(())
        }
        Commands::Import { file } => {
            let report = service
                .import_from_file(&file)
                .await
                .with_context(|| format!("Error importing {}", file.display()))?;
            println!("Successfully imported {} notes.", report.imported);
            if report.skipped > 0 {
                println!("Skipped {} invalid entries.", report.skipped);
            }
            Ok(())
        }
        Commands::List { search, rating, tags } => {
            let criteria = FilterCriteria::from_inputs(&search, &rating, &tags);
            for note in service.search(&criteria) {
                let rating = note.rating.map(|r| format!("[{}] ", r)).unwrap_or_default();
                println!("{}{}", rating, note.display_name());
                if note.is_resolved() {
                    println!("    {}", note.link);
                }
                if let Some(tags) = note.tags.as_ref().filter(|t| !t.is_empty()) {
                    println!("    tags: {}", tags.join(", "));
                }
            }
            Ok(())
        }
    }
}

/// Log to a daily file under the data directory; stdout belongs to the UI.
fn init_tracing(config: &Config) -> Result<WorkerGuard> {
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "cfnotes.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(non_blocking)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(guard)
}

async fn run_tui(service: NoteService) -> Result<()> {
    let export_dir = std::env::current_dir()?;
    let mut app = App::new(service, export_dir);

    // Setup terminal
    enable_raw_mode().map_err(|e| anyhow::anyhow!("Failed to enable raw mode: {}. Make sure you're running in a terminal.", e))?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| anyhow::anyhow!("Failed to enter alternate screen: {}. Make sure you're running in a terminal.", e))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| anyhow::anyhow!("Failed to create terminal: {}. Make sure you're running in a terminal.", e))?;

    let result = event_loop(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|f| app.render(f))?;

        // A queued action runs right after the frame showing it as busy, and
        // before any further input is read.
        if app.is_busy() {
            app.run_pending().await;
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key.code, key.modifiers);
            }
        }
    }
    Ok(())
}
