use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use round_monitor::config::DEFAULT_CONFIG_FILE;

mod cmd;

#[derive(Parser)]
#[command(name = "round-monitor")]
#[command(
    version,
    about = "Forging round monitor with safe restart coordination"
)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the monitor and its control server
    Run {
        /// Control server port (defaults to the node P2P port plus 1000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Node API base URL
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Ask a running monitor to restart the node at the next safe moment
    Restart {
        /// Control server URL (defaults to the configured host and port)
        #[arg(long)]
        url: Option<String>,
    },
    /// Cancel a pending safe restart
    Cancel {
        /// Control server URL (defaults to the configured host and port)
        #[arg(long)]
        url: Option<String>,
    },
    /// Show the latest status reported by a running monitor
    Status {
        /// Control server URL (defaults to the configured host and port)
        #[arg(long)]
        url: Option<String>,
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
    /// Initialize a default round-monitor.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { port, api_url } => {
            cmd::cmd_run(&cli.config, *port, api_url.clone()).await?;
        }
        Commands::Restart { url } => cmd::cmd_restart(&cli.config, url.as_deref()).await?,
        Commands::Cancel { url } => cmd::cmd_cancel(&cli.config, url.as_deref()).await?,
        Commands::Status { url } => cmd::cmd_status(&cli.config, url.as_deref()).await?,
        Commands::Config { command } => cmd::cmd_config(&cli.config, command.clone())?,
    }

    Ok(())
}
