use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use deplik::config::{CliOverrides, DeplikConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "deplik")]
#[command(version, about = "Pre-deployment sandbox front-end and API proxy")]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a config file. Defaults to ./deplik.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Base URL of the analysis backend (overrides config and DEPLIK_BACKEND_URL)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the page and proxy /api/run and /api/logs/{id} to the backend
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Open a browser once the server is up
        #[arg(long)]
        open: bool,

        /// Enable dev mode (bind all interfaces, permissive CORS)
        #[arg(long)]
        dev: bool,
    },
    /// Submit a repository and follow its build logs in the terminal
    Submit {
        /// Repository URL, e.g. https://github.com/user/repo
        repo_url: String,

        /// Go through a running Deplik server instead of the backend directly
        #[arg(long)]
        server: Option<String>,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Write a default deplik.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    let work_dir = std::env::current_dir().context("Failed to get current directory")?;

    let mut overrides = CliOverrides {
        backend_url: cli.backend_url.clone(),
        log_level: cli.verbose.then(|| "debug".to_string()),
        ..Default::default()
    };
    if let Commands::Serve { port, host, dev, .. } = &cli.command {
        overrides.port = *port;
        overrides.host = host.clone();
        overrides.dev_mode = *dev;
    }

    let mut config = DeplikConfig::resolve(&work_dir, cli.config.as_deref(), &overrides)?;

    // Keep the terminal client's output readable unless asked otherwise.
    if matches!(cli.command, Commands::Submit { .. }) && !cli.verbose {
        config.logging.level = "warn".to_string();
    }
    let _log_guard = deplik::logging::init(&config.logging)?;

    match &cli.command {
        Commands::Serve { open, .. } => cmd::cmd_serve(&config, *open).await?,
        Commands::Submit { repo_url, server } => {
            cmd::cmd_submit(&config, repo_url, server.as_deref()).await?
        }
        Commands::Config { command } => cmd::cmd_config(&work_dir, command.clone(), &config)?,
    }

    Ok(())
}
