//! `vcount` command-line client.

mod cli;
mod commands;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vcount_client::{BackendClient, ClientConfig};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vcount=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.backend_url {
        config = config.with_base_url(url);
    }
    let client = BackendClient::new(config)?;

    match cli.command {
        Command::Run(args) => commands::run_job(client, args).await,
        Command::Calibrate(args) => commands::calibrate(&client, args).await,
        Command::Health => commands::health(&client).await,
        Command::DownloadCsv { out } => commands::download_csv(&client, &out).await,
    }
}
