//! possync CLI
//!
//! Command-line tools for inspecting a terminal's local store.
//!
//! # Commands
//!
//! - `status` - Display the offline flag, record counts and queue depth
//! - `queue` - List or clear pending actions
//! - `audit` - List, search or clear the audit log

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// possync command-line tools.
#[derive(Parser)]
#[command(name = "possync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the terminal's data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(global = true, short, long, default_value = "text")]
    format: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display offline flag, record counts, queue depth and audit size
    Status,

    /// Inspect or clear the action queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Inspect or clear the audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum QueueAction {
    /// List pending actions, oldest first
    List,
    /// Drop every pending action
    Clear,
}

#[derive(Subcommand)]
enum AuditAction {
    /// List entries, most recent first
    List {
        /// Only entries about this entity kind
        #[arg(short, long)]
        kind: Option<String>,

        /// Case-insensitive text to search for
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Remove every entry
    Clear,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Status => {
            let path = cli.path.ok_or("Data path required for status")?;
            commands::status::run(&path, &cli.format)?;
        }
        Commands::Queue { action } => {
            let path = cli.path.ok_or("Data path required for queue")?;
            match action {
                QueueAction::List => commands::queue::list(&path, &cli.format)?,
                QueueAction::Clear => commands::queue::clear(&path)?,
            }
        }
        Commands::Audit { action } => {
            let path = cli.path.ok_or("Data path required for audit")?;
            match action {
                AuditAction::List {
                    kind,
                    search,
                    limit,
                } => commands::audit::list(&path, kind.as_deref(), search, limit, &cli.format)?,
                AuditAction::Clear => commands::audit::clear(&path)?,
            }
        }
        Commands::Version => {
            println!("possync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("possync Core v{}", possync_core::VERSION);
        }
    }

    Ok(())
}
