//! HabitSync CLI
//!
//! Command-line interface for HabitSync - habits and notes that sync
//! between devices through a shared folder.

use std::fs::File;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use habitsync_core::models::EntityId;
use habitsync_core::{Config, StorageError, Store};

mod commands;
mod output;

use output::{Output, OutputFormat};

/// Environment variable enabling debug logging, holding the level
const LOG_ENV: &str = "HABITSYNC_LOG";

#[derive(Parser)]
#[command(name = "habitsync")]
#[command(about = "HabitSync - Offline-first habits and notes")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage habits
    Habit {
        #[command(subcommand)]
        command: HabitCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Sync with the shared remote folder
    Sync,
    /// Show status (device id, pending events, checkpoint)
    Status,
    /// Show this device's id
    Device,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum HabitCommands {
    /// Add a new habit
    #[command(alias = "create")]
    Add {
        /// Habit name
        name: String,
    },
    /// List all habits
    #[command(alias = "ls")]
    List,
    /// Check off a day (today unless --day is given)
    Toggle {
        /// Habit ID
        id: EntityId,
        /// Day index in the 365-day history (364 is today)
        #[arg(short, long)]
        day: Option<usize>,
        /// Uncheck instead of check
        #[arg(long)]
        off: bool,
    },
    /// Delete a habit
    #[command(alias = "rm")]
    Delete {
        /// Habit ID
        id: EntityId,
    },
}

#[derive(Subcommand)]
enum NoteCommands {
    /// Add a new note
    #[command(alias = "create")]
    Add {
        /// Note title
        title: String,
        /// Note content
        #[arg(short, long)]
        content: Option<String>,
        /// Soft-wrap the content when displayed
        #[arg(long)]
        wrap: bool,
    },
    /// List all notes
    #[command(alias = "ls")]
    List,
    /// Show a note in full
    Show {
        /// Note ID
        id: EntityId,
    },
    /// Edit a note's title or content
    Edit {
        /// Note ID
        id: EntityId,
        /// New title
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// New content
        #[arg(short, long)]
        content: Option<String>,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Note ID
        id: EntityId,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, account_id, remote_dir, sync_enabled,
        /// snapshot_interval_hours, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Commands that don't need the store
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), &output);
    }

    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config);

    let mut store = match Store::open_with_config(config) {
        Ok(store) => store,
        Err(e) => {
            print_recovery_hint(&e, &output);
            return Err(e);
        }
    };

    let is_write = matches!(
        &cli.command,
        Commands::Habit {
            command: HabitCommands::Add { .. }
                | HabitCommands::Toggle { .. }
                | HabitCommands::Delete { .. }
        } | Commands::Note {
            command: NoteCommands::Add { .. }
                | NoteCommands::Edit { .. }
                | NoteCommands::Delete { .. }
        }
    );

    let result = match cli.command {
        Commands::Habit { command } => handle_habit_command(command, &mut store, &output),
        Commands::Note { command } => handle_note_command(command, &mut store, &output),
        Commands::Sync => commands::sync::sync(&mut store, &output).await,
        Commands::Status => commands::status::show(&store, &output),
        Commands::Device => {
            println!("{}", store.device_id());
            Ok(())
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    // Push local changes right away when sync is configured
    if is_write && result.is_ok() {
        auto_sync(&mut store, &output).await;
    }

    if let Err(e) = &result {
        print_recovery_hint(e, &output);
    }
    result
}

fn handle_habit_command(command: HabitCommands, store: &mut Store, output: &Output) -> Result<()> {
    match command {
        HabitCommands::Add { name } => commands::habit::add(store, name, output),
        HabitCommands::List => commands::habit::list(store, output),
        HabitCommands::Toggle { id, day, off } => {
            commands::habit::toggle(store, id, day, off, output)
        }
        HabitCommands::Delete { id } => commands::habit::delete(store, id, output),
    }
}

fn handle_note_command(command: NoteCommands, store: &mut Store, output: &Output) -> Result<()> {
    match command {
        NoteCommands::Add {
            title,
            content,
            wrap,
        } => commands::note::add(store, title, content, wrap, output),
        NoteCommands::List => commands::note::list(store, output),
        NoteCommands::Show { id } => commands::note::show(store, id, output),
        NoteCommands::Edit { id, title, content } => {
            commands::note::edit(store, id, title, content, output)
        }
        NoteCommands::Delete { id } => commands::note::delete(store, id, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Suggestion attached to a local storage failure anywhere in the chain
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StorageError>())
        .and_then(StorageError::recovery_suggestion)
}

fn print_recovery_hint(err: &anyhow::Error, output: &Output) {
    if let Some(hint) = recovery_hint(err) {
        if !output.is_quiet() {
            eprintln!("Hint: {}", hint);
        }
    }
}

/// Auto-sync if sync is configured, never fails the command
async fn auto_sync(store: &mut Store, output: &Output) {
    if let Err(e) = commands::sync::sync_quiet(store).await {
        if !output.is_quiet() {
            eprintln!("⚠ Auto-sync failed: {}", e);
        }
    }
}

/// Initialize logging
///
/// Only initializes if HABITSYNC_LOG environment variable is set.
/// Logs to file (config.log_file or default {data_dir}/debug.log).
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var(LOG_ENV) else {
        return;
    };

    let log_path = config
        .log_file
        .clone()
        .unwrap_or_else(|| config.data_dir.join("debug.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "habitsync_core={},habitsync={}",
        log_level, log_level
    ));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(log_file)
        .try_init();

    info!("Logging initialized to {:?}", log_path);
}
