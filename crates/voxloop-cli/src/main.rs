//! `vox` -- CLI binary for the voxloop voice-chat client.
//!
//! Provides the following subcommands:
//!
//! - `vox talk` -- Run conversation turns against the backend from
//!   prepared audio clips, optionally in continuous mode.
//! - `vox say` -- Synthesize text through the standalone TTS path.
//! - `vox status` -- Probe backend health and show the aggregate.
//! - `vox sessions` -- Inspect, reset, or clear the active session.
//! - `vox diagnose` -- Run connectivity and capability diagnostics.

use clap::{Parser, Subcommand};

mod commands;

/// voxloop voice-chat CLI.
#[derive(Parser)]
#[command(name = "vox", about = "voxloop voice-chat CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (overrides auto-discovery).
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run conversation turns from prepared audio clips.
    Talk(commands::talk::TalkArgs),

    /// Synthesize text to speech.
    Say(commands::say::SayArgs),

    /// Probe backend health and show the aggregate status.
    Status,

    /// Manage the active session.
    Sessions {
        #[command(subcommand)]
        action: commands::sessions::SessionsCmd,
    },

    /// Run connectivity and capability diagnostics.
    Diagnose,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.as_deref().map(std::path::Path::new);

    match cli.command {
        Commands::Talk(args) => commands::talk::run(args, config_path).await,
        Commands::Say(args) => commands::say::run(args, config_path).await,
        Commands::Status => commands::status::run(config_path).await,
        Commands::Sessions { action } => commands::sessions::run(action, config_path).await,
        Commands::Diagnose => commands::diagnose::run(config_path).await,
    }
}
