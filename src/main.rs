use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use devagent::config::{CliOverrides, DashboardConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "devagent")]
#[command(version, about = "Operations dashboard for autonomous code-analysis agents")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Agent backend URL. Overrides devagent.toml and DEVAGENT_API_URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Live dashboard in the terminal (Ctrl+C to stop)
    Watch,
    /// List connected repositories
    Repos,
    /// List jobs, optionally filtered by status
    Jobs {
        /// all, pending, running, completed or failed
        #[arg(short, long, default_value = "all")]
        status: String,
    },
    /// Show one job with its logs and analysis progress
    Job { id: String },
    /// Show dashboard statistics and backend health
    Stats,
    /// Connect a repository to the agent
    Connect {
        /// Repository URL
        url: String,
        /// Display name for the repository (defaults to the URL's last segment)
        #[arg(short, long)]
        name: Option<String>,
        /// Access token for private repositories
        #[arg(long)]
        token: Option<String>,
    },
    /// Trigger a demo analysis and show the resulting jobs
    Trigger,
    /// Send a message to the agent
    Chat { message: String },
    /// Serve dashboard projections over HTTP and WebSocket
    Serve {
        /// Port to serve on (defaults to serve_port in devagent.toml)
        #[arg(short, long)]
        port: Option<u16>,

        /// Open the dashboard in a browser
        #[arg(long)]
        open: bool,

        /// Bind on all interfaces and allow cross-origin requests
        #[arg(long)]
        dev: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default devagent.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let overrides = CliOverrides {
        api_url: cli.api_url.clone(),
        serve_port: match &cli.command {
            Commands::Serve { port, .. } => *port,
            _ => None,
        },
    };

    if let Commands::Config { command } = &cli.command {
        cmd::init_logging(cli.verbose, None);
        return cmd::cmd_config(&project_dir, &overrides, command.clone());
    }

    let config = DashboardConfig::resolve(&project_dir, &overrides)
        .context("Failed to load configuration")?;

    let log_dir = matches!(cli.command, Commands::Watch).then_some(config.log_dir.as_path());
    let _log_guard = cmd::init_logging(cli.verbose, log_dir);

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    match &cli.command {
        Commands::Watch => cmd::cmd_watch(&config).await?,
        Commands::Repos => cmd::cmd_repos(&config).await?,
        Commands::Jobs { status } => cmd::cmd_jobs(&config, status).await?,
        Commands::Job { id } => cmd::cmd_job(&config, id).await?,
        Commands::Stats => cmd::cmd_stats(&config).await?,
        Commands::Connect { url, name, token } => {
            cmd::cmd_connect(&config, url, name.as_deref(), token.as_deref()).await?
        }
        Commands::Trigger => cmd::cmd_trigger(&config).await?,
        Commands::Chat { message } => cmd::cmd_chat(&config, message).await?,
        Commands::Serve { open, dev, .. } => cmd::cmd_serve(&config, *open, *dev).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
