mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use galaxy::config::GalaxyConfig;

#[derive(Parser)]
#[command(name = "galaxy", version, about = "Semantic maps of GitHub repositories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the web UI
    Serve,
    /// Search, embed and map repositories once, writing an HTML file
    Explore(cli::explore::ExploreArgs),
    /// Check credentials, embedding method and model files
    Doctor,
    /// Manage the local embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.galaxy/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = GalaxyConfig::load()?;

    // stdout is reserved for command output
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            galaxy::server::serve(config).await?;
        }
        Command::Explore(args) => {
            cli::explore::explore(&config, args).await?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config);
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}
