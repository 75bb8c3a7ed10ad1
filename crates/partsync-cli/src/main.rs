//! partsync CLI
//!
//! Command-line interface for inspecting and editing document parts on a
//! transcription server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use partsync_core::models::{LineId, PartId, TranscriptionId};
use partsync_core::{Config, PartStore, SyncError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "partsync")]
#[command(about = "partsync - Inspect and edit transcribed document parts")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Transcription layer to use instead of the configured one
    #[arg(short, long, global = true)]
    transcription: Option<TranscriptionId>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the lines of a part in reading order
    Show {
        /// Part key
        part: PartId,
    },
    /// Show the version history of a line
    History {
        /// Part key
        part: PartId,
        /// Line key
        line: LineId,
    },
    /// Replace the transcription of a line
    SetText {
        /// Part key
        part: PartId,
        /// Line key
        line: LineId,
        /// New content
        text: String,
        /// Also snapshot the saved content as a new version
        #[arg(long)]
        snapshot: bool,
    },
    /// Recompute line masks
    Masks {
        /// Part key
        part: PartId,
        /// Only these lines (comma separated keys)
        #[arg(long, value_delimiter = ',')]
        only: Vec<LineId>,
    },
    /// Recompute the reading order
    Reorder {
        /// Part key
        part: PartId,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let mut config = Config::load().context("Failed to load configuration")?;
    init_logging(&config, cli.verbose);

    // Commands that don't need the store
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&config, &output),
        };
    }

    if let Some(transcription) = cli.transcription {
        config.transcription = Some(transcription);
    }
    let store = PartStore::from_config(&config)?;

    let result = match cli.command {
        Commands::Show { part } => commands::part::show(&store, part, &output).await,
        Commands::History { part, line } => {
            commands::line::history(&store, part, line, &output).await
        }
        Commands::SetText {
            part,
            line,
            text,
            snapshot,
        } => commands::line::set_text(&store, part, line, text, snapshot, &output).await,
        Commands::Masks { part, only } => commands::part::masks(&store, part, only, &output).await,
        Commands::Reorder { part } => commands::part::reorder(&store, part, &output).await,
        Commands::Config { .. } => unreachable!(), // Handled above
    };

    // Let pending recalculations go out before exiting
    store.flush().await;
    store.dispose().await;

    if let Err(ref err) = result {
        if let Some(hint) = err
            .downcast_ref::<SyncError>()
            .and_then(SyncError::recovery_suggestion)
        {
            eprintln!("Hint: {}", hint);
        }
    }

    result
}

/// Log to stderr, level from -v flags or the config
fn init_logging(config: &Config, verbose: u8) {
    let log_level = match verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::new(format!(
        "partsync_core={},partsync_cli={}",
        log_level, log_level
    ));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
