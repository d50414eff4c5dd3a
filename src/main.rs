use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "rigup")]
#[command(version, about = "GPU inference rig provisioner")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    /// Path to the config file
    #[arg(long, global = true, default_value = "rigup.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision the rig end-to-end and start the inference server
    Run,
    /// Show what is already provisioned and what a run would do
    Status,
    /// Stop the inference server and the chat UI container
    Stop,
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Write a default rigup.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "rigup=debug" } else { "rigup=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Run => cmd::cmd_run(cli.verbose, &cli.config).await?,
        Commands::Status => cmd::cmd_status(&cli.config).await?,
        Commands::Stop => cmd::cmd_stop(cli.yes, &cli.config).await?,
        Commands::Config { command } => match command.clone().unwrap_or(ConfigCommands::Show) {
            ConfigCommands::Show => cmd::cmd_config_show(&cli.config)?,
            ConfigCommands::Init { force } => cmd::cmd_config_init(&cli.config, force)?,
        },
    }

    Ok(())
}
