//! Scénario de test sur table : bras, tag puis relevé du bras

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pmoturntable::TagId;
use pmoturntable::sim::{SimulatedArm, SimulatedTagReader};
use tokio::time::sleep;
use tracing::info;

/// Bras posé à 2 s, tag présenté à 4 s, bras relevé et tag retiré à 20 s,
/// arrêt à 23 s
pub async fn run_timeline(
    arm: SimulatedArm,
    tags: SimulatedTagReader,
    tag: TagId,
    shutdown: Arc<AtomicBool>,
) {
    info!("🧪 Simulation started with tag {}", tag);

    sleep(Duration::from_secs(2)).await;
    arm.lower();

    sleep(Duration::from_secs(2)).await;
    tags.present(tag);

    sleep(Duration::from_secs(16)).await;
    arm.lift();
    tags.remove();

    sleep(Duration::from_secs(3)).await;
    info!("🧪 Simulation finished");
    shutdown.store(true, Ordering::Release);
}
