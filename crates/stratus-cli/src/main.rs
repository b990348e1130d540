mod args;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use stratus_fleet::{FleetConfig, FleetController, ShutdownCoordinator};
use stratus_provider::HttpProvider;

use crate::args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if args.nodes == 0 {
        error!("node count must be at least 1");
        std::process::exit(1);
    }

    let api_key = match std::env::var("STRATUS_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => {
            error!("STRATUS_API_KEY is not set; export it or put it in a .env file");
            std::process::exit(1);
        }
    };

    let provider = match HttpProvider::new(&args.api_url, &api_key) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!(error = %e, "failed to build provider client");
            std::process::exit(1);
        }
    };

    info!(
        nodes = args.nodes,
        node_type = ?args.node_type,
        poll_secs = args.poll,
        keep_running = args.keep_running,
        "starting stratus"
    );

    let controller = FleetController::new(
        provider,
        FleetConfig {
            target_count: args.nodes,
            policy: args.node_type.to_policy(),
            keep_running: args.keep_running,
            poll_interval: Duration::from_secs(args.poll),
            ..FleetConfig::default()
        },
    );

    controller.launch_fleet().await;

    // Run until the operator interrupts, or until every monitor has exited
    // on its own (the whole fleet died with replacement disabled).
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received"),
        _ = controller.monitors_finished() => info!("all monitors finished"),
    }

    ShutdownCoordinator::new(Arc::clone(&controller), args.no_rm).run().await;
    info!("bye");
    Ok(())
}
