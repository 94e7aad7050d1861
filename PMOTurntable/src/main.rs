mod cli;
mod simulation;
mod wiring;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pmoconfig::Config;
use pmoturntable::{TagId, TagRegistry, TonearmController};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;

/// RUST_LOG prioritaire, sinon `logger.min_level`
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logger.min_level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ========== PHASE 1 : Configuration ==========
    let config = Config::load(&args.config_dir()).context("Cannot load configuration")?;
    init_logging(&config);
    info!("⚙️ Configuration loaded from {}", config.config_dir().display());

    if let Err(e) = config.validate() {
        error!("❌ Invalid configuration: {}", e);
        return Err(e).context("Invalid configuration");
    }

    // ========== PHASE 2 : Composants ==========
    let registry = TagRegistry::load(&config.tags_path());
    if registry.is_empty() {
        warn!("⚠️ No tag registered, nothing can be played");
    }

    let backend = wiring::build_backend(&config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let (hardware, timeline) = match &args.simulate {
        Some(tag) => {
            let (hardware, arm, tags) = wiring::simulated_hardware();
            let timeline = tokio::spawn(simulation::run_timeline(
                arm,
                tags,
                TagId::new(tag.as_str()),
                Arc::clone(&shutdown),
            ));
            (hardware, Some(timeline))
        }
        None => (wiring::raspberry_pi_hardware(&config.turntable)?, None),
    };

    let mut controller = TonearmController::new(
        hardware.sensor,
        hardware.reader,
        hardware.motor,
        backend,
        registry,
    );

    // ========== PHASE 3 : Boucle de contrôle ==========
    let period = Duration::from_millis(config.turntable.poll_interval_ms);
    let flag = Arc::clone(&shutdown);
    let control = tokio::task::spawn_blocking(move || controller.run(period, &flag));

    info!("✅ PMOTurntable is ready!");
    info!("Press Ctrl+C to stop...");

    match timeline {
        Some(timeline) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("🛑 Interrupted"),
                _ = timeline => {}
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Cannot listen for Ctrl+C")?;
            info!("🛑 Interrupted");
        }
    }

    shutdown.store(true, Ordering::Release);
    control.await.context("Control loop panicked")?;

    info!("👋 PMOTurntable stopped");
    Ok(())
}
