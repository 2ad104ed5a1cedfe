#![forbid(unsafe_code)]

mod activation;
mod catalog;
mod config;
mod constants;
mod daemon;
mod engine;
mod error;
mod ipc;
mod platform;
mod randomizer;
mod resolver;
mod scanner;
#[cfg(test)]
mod test_support;
mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use config::SettingsUpdate;
use daemon::DaemonOptions;
use ipc::{Client, Request, Response};
use platform::{Capabilities, DataPaths};
use types::{AnimationSet, CustomAnimation, ShuffleMode, Target};

#[derive(Parser)]
#[command(version, about = "Manage Steam boot and suspend animations")]
struct Cli {
    /// Directory holding config.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Directory holding animations/ and downloads/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Steam install root
    #[arg(long, global = true, env = "STEAM_ROOT")]
    steam_root: Option<PathBuf>,

    /// Daemon socket path (pipe name on Windows)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the stored selection and serve requests
    Daemon,
    /// Print the full state snapshot
    State,
    /// Create or replace a custom set
    SaveSet {
        id: String,
        #[arg(long, default_value = "")]
        boot: String,
        #[arg(long, default_value = "")]
        suspend: String,
        #[arg(long, default_value = "")]
        throbber: String,
        /// Store the set disabled
        #[arg(long)]
        disabled: bool,
    },
    RemoveSet {
        id: String,
    },
    /// Enable or disable a local or custom set
    EnableSet {
        id: String,
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        enabled: bool,
    },
    /// Register an animation file from anywhere on disk
    SaveAnimation {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        path: PathBuf,
        #[arg(long, value_enum)]
        target: Target,
    },
    RemoveAnimation {
        id: String,
    },
    /// Refetch the remote catalog
    Refresh,
    /// List cached catalog entries
    Catalog {
        #[arg(long, conflicts_with = "available")]
        id: Option<String>,
        /// Only entries not downloaded yet
        #[arg(long)]
        available: bool,
    },
    Download {
        id: String,
    },
    /// Delete a downloaded animation
    Delete {
        id: String,
    },
    /// Update settings; omitted flags keep their stored value
    Settings {
        #[arg(long)]
        boot: Option<String>,
        #[arg(long)]
        suspend: Option<String>,
        #[arg(long)]
        throbber: Option<String>,
        #[arg(long, value_enum)]
        randomize: Option<ShuffleMode>,
        #[arg(long)]
        current_set: Option<String>,
        /// Replace the shuffle exclusion list (pass with no values to clear)
        #[arg(long, num_args = 0..)]
        exclude: Option<Vec<String>>,
        #[arg(long)]
        force_ipv4: Option<bool>,
    },
    /// Reload config and local animations, then re-apply
    Reload,
    /// Pick a random set, or every slot with --shuffle
    Randomize {
        #[arg(long)]
        shuffle: bool,
    },
    Ping,
    Shutdown,
}

impl Commands {
    /// Request sent for a client subcommand; `None` for `daemon`
    fn into_request(self) -> Option<Request> {
        let request = match self {
            Commands::Daemon => return None,
            Commands::State => Request::GetState,
            Commands::SaveSet {
                id,
                boot,
                suspend,
                throbber,
                disabled,
            } => Request::SaveCustomSet(AnimationSet {
                id,
                enabled: !disabled,
                boot,
                suspend,
                throbber,
            }),
            Commands::RemoveSet { id } => Request::RemoveCustomSet(id),
            Commands::EnableSet { id, enabled } => Request::EnableSet { id, enabled },
            Commands::SaveAnimation { id, name, path, target } => {
                Request::SaveCustomAnimation(CustomAnimation { id, name, path, target })
            }
            Commands::RemoveAnimation { id } => Request::RemoveCustomAnimation(id),
            Commands::Refresh => Request::UpdateCatalog,
            Commands::Catalog { id: Some(id), .. } => Request::GetCatalogEntry(id),
            Commands::Catalog { id: None, available: true } => Request::GetAvailable,
            Commands::Catalog { id: None, available: false } => Request::GetCatalog,
            Commands::Download { id } => Request::Download(id),
            Commands::Delete { id } => Request::DeleteDownload(id),
            Commands::Settings {
                boot,
                suspend,
                throbber,
                randomize,
                current_set,
                exclude,
                force_ipv4,
            } => Request::SaveSettings(SettingsUpdate {
                boot,
                suspend,
                throbber,
                randomize,
                current_set,
                shuffle_exclusions: exclude,
                force_ipv4,
            }),
            Commands::Reload => Request::Reload,
            Commands::Randomize { shuffle } => Request::Randomize { shuffle },
            Commands::Ping => Request::Ping,
            Commands::Shutdown => Request::Shutdown,
        };
        Some(request)
    }
}

fn init_logging() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")
}

async fn run_daemon(cli: Cli, socket: PathBuf) -> Result<()> {
    let steam_root = platform::discover_steam_root(cli.steam_root).context("Failed to locate the Steam install")?;
    info!(steam_root = %steam_root.display(), "Found Steam install");

    let options = DaemonOptions {
        paths: DataPaths::resolve(cli.config_dir, cli.data_dir),
        caps: Capabilities::for_current_platform(&steam_root),
        socket,
        catalog_url: constants::catalog::POSTS_URL.to_string(),
    };
    daemon::run(options).await
}

async fn send(socket: PathBuf, request: Request) -> Result<()> {
    let mut client = Client::connect_to(&socket).await?;
    let response = client.request(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if let Response::Error(message) = response {
        anyhow::bail!(message);
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging()?;

    let mut cli = Cli::parse();
    let socket = match cli.socket.take() {
        Some(socket) => socket,
        None => ipc::default_socket_path()?,
    };

    let command = std::mem::replace(&mut cli.command, Commands::Daemon);
    match command.into_request() {
        None => run_daemon(cli, socket).await,
        Some(request) => send(socket, request).await,
    }
}
