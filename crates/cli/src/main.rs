//! faceindex CLI - background face indexing for a photo library

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use commands::{cmd_clustered, cmd_config_init, cmd_config_show, cmd_faces, cmd_run, cmd_status};
use logging::{init_cli_logging, init_daemon_logging};

#[derive(Parser)]
#[command(name = "faceindex")]
#[command(about = "Detect and embed the faces in your photo library in the background")]
#[command(after_help = "\
QUICK START:
  faceindex config init           # Write the default user config
  faceindex run --foreground      # Index with logs on the console
  faceindex status                # Show indexing progress")]
struct Cli {
  /// Config file to use instead of the user config
  #[arg(long, global = true, value_name = "FILE")]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

/// Subcommands for `faceindex config`
#[derive(Subcommand)]
pub enum ConfigCommand {
  /// Show the effective configuration
  Show,
  /// Create the user config file with defaults
  Init {
    /// Overwrite an existing config file
    #[arg(long)]
    force: bool,
  },
}

#[derive(Subcommand)]
enum Commands {
  /// Run the indexer until interrupted
  Run {
    /// Log to the console instead of the log file
    #[arg(long)]
    foreground: bool,
  },
  /// Show library-wide indexing status
  Status {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// List the faces of a file that are not attributed to a person yet
  Faces {
    /// File id from the catalog
    file_id: u64,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },
  /// Mark every indexed face as clustered, after an external clustering pass
  Clustered,
  /// Configuration management
  Config {
    #[command(subcommand)]
    command: ConfigCommand,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // File logging for the daemon, console-only for other commands
  let _guard = match &cli.command {
    Commands::Run { foreground } => init_daemon_logging(cli.config.as_deref(), *foreground),
    _ => {
      init_cli_logging();
      None
    }
  };

  match cli.command {
    Commands::Run { .. } => cmd_run(cli.config).await,
    Commands::Status { json } => cmd_status(cli.config, json).await,
    Commands::Faces { file_id, json } => cmd_faces(cli.config, file_id, json).await,
    Commands::Clustered => cmd_clustered(cli.config).await,
    Commands::Config { command } => match command {
      ConfigCommand::Show => cmd_config_show(cli.config.as_deref()),
      ConfigCommand::Init { force } => cmd_config_init(force),
    },
  }
}
