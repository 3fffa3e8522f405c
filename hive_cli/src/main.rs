use crate::init_config::CmdConfig;
use anyhow::Context;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use directories::ProjectDirs;
use hive_core::CoreError;
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;
mod init_config;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(flatten)]
    verbosity: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the config file
    Config {
        #[command(subcommand)]
        cmd: CmdConfig,
    },
    /// Upload a local file or directory and pin it
    Add {
        path: PathBuf,
        /// Name recorded with the pin
        #[arg(short, long)]
        name: String,
    },
    /// Pin an object
    Pin {
        /// Immutable path (/ipfs/<cid>/...) or bare CID
        reference: String,
        #[arg(short, long)]
        name: String,
    },
    /// Remove the direct pin of an object
    Unpin { reference: String },
    /// Unpin an object and collect garbage
    Rm { reference: String },
    /// Show the pin status of an object
    Status { reference: String },
    /// Recreate an object (file or directory tree) on disk
    Get {
        reference: String,
        /// Destination directory, or file path for a file object
        #[arg(short, long, value_name = "PATH")]
        out: PathBuf,
    },
    /// Download a file object
    Download {
        reference: String,
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Print the content of a file object
    Cat { reference: String },
    /// List a directory object
    Ls { reference: String },
    /// List all pins
    Pins,
    /// List connected peers
    Peers,
    /// Show identity and capabilities of a peer
    Info { peer: String },
    /// Ping a peer
    Ping { peer: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let client_error = err
                .downcast_ref::<CoreError>()
                .is_some_and(CoreError::is_client_error);
            if client_error {
                eprintln!("error: {err:#}");
            } else {
                tracing::error!("{err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Configs live under ~/.config/hive/config.toml unless --config is given.
    let config_file = match cli.config {
        Some(path) => path,
        None => ProjectDirs::from("", "", "hive")
            .context("failed to determine config directory path")?
            .config_dir()
            .join("config.toml"),
    };

    cmd::run_command(&config_file, cli.cmd).await
}
