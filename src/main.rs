//! CLI entry point (SPEC_FULL §2 ambient #12), grounded on the teacher
//! crate's `main.rs` (`clap`-derived `--config`/`--generate-config`,
//! `tracing_subscriber::FmtSubscriber` init, `tokio::select!` over the
//! web server and a shutdown signal).

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use lighthouse_bridge::bridge::Bridge;
use lighthouse_bridge::config::Config;
use lighthouse_bridge::web;

#[derive(Parser, Debug)]
#[command(name = "lighthouse-bridge")]
#[command(version)]
#[command(about = "An OpenSim-Matrix group chat puppeting bridge")]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print an example configuration and exit
    #[arg(long)]
    generate_config: bool,
}

const EXAMPLE_CONFIG: &str = include_str!("../example-config.yaml");

fn log_level(s: &str) -> Level {
    s.parse().unwrap_or(Level::INFO)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.generate_config {
        println!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let config_path = args.config.to_string_lossy().into_owned();
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            // CONFIG errors are fatal at startup (distilled spec §7).
            eprintln!("failed to load config from {config_path}: {e}");
            std::process::exit(1);
        }
    };

    FmtSubscriber::builder()
        .with_max_level(log_level(&config.logging.level))
        .pretty()
        .init();

    info!("starting lighthouse-bridge v{}", env!("CARGO_PKG_VERSION"));
    info!(path = %config_path, "config loaded");

    let bridge = Bridge::new(config.clone()).await?;
    let bridge = Arc::new(bridge);

    let router = web::create_router(bridge.clone());
    let addr = format!("{}:{}", config.server.bind_host, config.server.bind_port);
    info!(%addr, "web server starting");

    let web_handle = tokio::spawn(async move {
        use salvo::conn::TcpListener;
        use salvo::prelude::*;

        let listener = TcpListener::new(addr.as_str()).bind().await;
        Server::new(listener).serve(router).await;
    });

    tokio::select! {
        _ = web_handle => {
            error!("web server task ended unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    info!("lighthouse-bridge stopped");
    Ok(())
}
