use std::path::PathBuf;

use clap::Parser;
use hackbox::prelude::*;
use tracing_subscriber::EnvFilter;

/// Party game server: rooms, timed rounds, and live voting over WebSockets.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// TOML config file (defaults to ./hackbox.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Port to listen on; overrides the config file and PORT
    #[arg(short, long)]
    port: Option<u16>,
    /// Category list file; overrides the config file
    #[arg(long)]
    categories: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), HackboxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref())?;
    config.apply_env()?;
    if let Some(port) = args.port {
        config.set_port(port)?;
    }
    if let Some(path) = args.categories {
        config.categories_path = path;
    }
    config.validate()?;

    let categories = config.load_categories()?;
    let server = HackboxServerBuilder::from_config(&config, categories)
        .build()
        .await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "listening");
    }

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
