//! Repitch CLI - Command-line interface
//!
//! Runs the web server or drives the derivation pipeline directly on a
//! single video.

mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "repitch")]
#[command(about = "Preview and export local videos with pitch-shifted audio")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    commands::handle_command(cli.command).await.map_err(|e| {
        let message = e.user_message();
        anyhow::Error::new(e).context(message)
    })?;

    Ok(())
}
