use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use bikeshare_engine::api::engine::RideEngine;
use bikeshare_engine::api::telemetry::init_tracing;
use bikeshare_engine::config::EngineConfig;
use bikeshare_engine::lock::mock::MockLockController;
use bikeshare_engine::server::handler::RideServer;

#[derive(Debug, Parser)]
#[command(name = "bikeshare-engine", about = "Campus bike-share rental engine")]
struct Args {
    /// Path to a TOML engine config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured listen address.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    let listen_addr = config.listen_addr.clone();
    info!(
        "starting with {} bikes, tick every {} ms",
        config.fleet.len(),
        config.tick_interval_ms
    );

    let mut engine = RideEngine::start(config, Arc::new(MockLockController::default()))?;
    let server = RideServer::start(engine.coordinator(), &listen_addr).await?;

    // Events are already logged by the engine; drain them so the queue stays empty.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                break;
            }
            event = engine.next_event() => {
                if event.is_none() {
                    break;
                }
            }
        }
    }
    info!("shutting down");
    server.shutdown();
    engine.dispose().await;
    Ok(())
}
