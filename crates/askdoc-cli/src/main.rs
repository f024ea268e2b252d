//! askdoc CLI: ask questions about local files

mod render;
mod shell;

use std::path::PathBuf;

use anyhow::{Context, Result};
use askdoc_core::{
    Config, DeleteOutcome, IndexManager, ResolveOutcome, ServiceContext, SourcePath, Storage,
    INDEX_READY_MESSAGE,
};
use clap::{Parser, Subcommand};

use crate::render::PassageHighlighter;

#[derive(Parser)]
#[command(name = "askdoc")]
#[command(about = "Ask questions about a file or folder using an OpenAI-compatible API", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default)
    Shell,

    /// Load the stored index, or build one from PATH
    Index {
        /// File or folder to index
        path: PathBuf,

        /// Treat PATH as a single file
        #[arg(short, long)]
        file: bool,
    },

    /// Load or build the index, then ask a question
    Query {
        /// File or folder to index
        path: PathBuf,

        /// Question to ask
        #[arg(required = true)]
        query: Vec<String>,

        /// Treat PATH as a single file
        #[arg(short, long)]
        file: bool,

        /// Print citations without highlighting
        #[arg(long)]
        plain: bool,
    },

    /// Delete the stored index
    Delete {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show configuration and stored index details
    Status,
}

fn main() -> Result<()> {
    // Logs go to stderr so they never mix with results
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Commands::Shell) => shell::run()?,
        Some(Commands::Index { path, file }) => cmd_index(SourcePath::new(path, file))?,
        Some(Commands::Query {
            path,
            query,
            file,
            plain,
        }) => {
            let query = query.join(" ");
            cmd_query(SourcePath::new(path, file), &query, plain)?;
        }
        Some(Commands::Delete { yes }) => cmd_delete(yes)?,
        Some(Commands::Status) => cmd_status()?,
    }

    Ok(())
}

/// Manager over the configured storage directory.
fn open_manager(config: &Config) -> IndexManager {
    IndexManager::new(Storage::new(&config.storage_dir))
}

/// Resolve the index with a spinner, then report how it went.
///
/// Configuration is re-read from the environment on every resolve, so a
/// bad value marks the manager failed like any other resolve error.
pub(crate) fn resolve(manager: &mut IndexManager, source: &SourcePath) -> askdoc_core::Result<()> {
    let (pb, callback) = render::progress_spinner();
    manager.set_progress_callback(callback);
    let result = manager.resolve_or_build_with(source, ServiceContext::from_env);
    pb.finish_and_clear();

    match result? {
        ResolveOutcome::Loaded => {
            println!(
                "Loaded existing index from {} (delete storage to index a different path).",
                manager.storage().dir().display()
            );
        }
        ResolveOutcome::Built(stats) => {
            println!(
                "Indexed {} documents ({} chunks, {} embedding requests).",
                stats.documents, stats.chunks_created, stats.embedding_requests
            );
        }
    }
    println!("{}", INDEX_READY_MESSAGE);
    Ok(())
}

/// Report the delete outcome on the results channel.
pub(crate) fn report_delete(outcome: DeleteOutcome) {
    match outcome {
        DeleteOutcome::Cancelled => println!("Storage deletion cancelled."),
        DeleteOutcome::Deleted { handle_dropped } => {
            println!("Storage deleted successfully.");
            if handle_dropped {
                println!("Loaded index discarded; load a path to continue.");
            }
        }
    }
}

fn cmd_index(source: SourcePath) -> Result<()> {
    let config = Config::from_env()?;
    let mut manager = open_manager(&config);
    resolve(&mut manager, &source)
        .with_context(|| format!("Failed to initialize index from {}", source))
}

fn cmd_query(source: SourcePath, query: &str, plain: bool) -> Result<()> {
    let config = Config::from_env()?;
    let mut manager = open_manager(&config);
    resolve(&mut manager, &source)
        .with_context(|| format!("Failed to initialize index from {}", source))?;

    let result = manager.query(query).context("Query failed")?;
    let highlighter = PassageHighlighter::new();
    render::print_query_result(query, &result, &highlighter, plain);
    Ok(())
}

fn cmd_delete(yes: bool) -> Result<()> {
    let config = Config::from_env()?;
    let mut manager = open_manager(&config);
    let outcome = manager
        .delete_storage(|_| yes || render::confirm("Are you sure you want to delete the storage?"))
        .context("Failed to delete storage")?;
    report_delete(outcome);
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::from_env()?;
    let storage = Storage::new(&config.storage_dir);
    render::print_status(&config, &storage);
    Ok(())
}
