use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cpt_gateway::{GatewayConfig, RestGateway};
use cpt_sync::{Session, SessionConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cpt")]
#[command(about = "Candidate pipeline tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the dashboard.
    Serve,
    /// One-shot refresh: fetch every row and print per-view counts.
    Fetch,
    /// Validate configuration without touching the network.
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => cpt_web::serve_from_env().await?,
        Commands::Fetch => {
            let config = SessionConfig::load()?;
            let gateway = RestGateway::new(GatewayConfig::from_env())?;
            let mut session = Session::new(config, Arc::new(gateway));
            let total = session.refresh().await?;
            println!("fetched {total} rows");
            for (view, count) in session.view_counts() {
                println!("{:>8}: {count}", view.as_str());
            }
        }
        Commands::Check => {
            let gateway_config = GatewayConfig::from_env();
            gateway_config.validate()?;
            let session_config = SessionConfig::load()?;
            println!(
                "configuration ok: table={} snooze_field={}",
                gateway_config.table, session_config.snooze_field
            );
        }
    }

    Ok(())
}
