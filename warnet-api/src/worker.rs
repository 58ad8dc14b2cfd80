use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};
use warnet_order::{RemoteSource, SessionOrchestrator};

/// Drives the orchestrator's tick. Countdowns are recomputed from stored
/// timestamps, so a delayed beat only delays visibility, never accuracy.
pub async fn start_tick_worker(orchestrator: Arc<SessionOrchestrator>, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Tick worker started, every {:?}", period);

    loop {
        ticker.tick().await;
        match orchestrator.tick().await {
            Ok(summary) if summary.sessions_completed > 0 || summary.bookings_expired > 0 => {
                info!(
                    "Tick: {} sessions completed, {} bookings expired",
                    summary.sessions_completed, summary.bookings_expired
                );
            }
            Ok(_) => {}
            Err(e) => error!("Tick failed: {}", e),
        }
    }
}

/// Periodically merges the backend's authoritative snapshot.
pub async fn start_reconcile_worker(
    orchestrator: Arc<SessionOrchestrator>,
    source: Arc<dyn RemoteSource>,
    period: Duration,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Reconcile worker started, every {:?}", period);

    loop {
        ticker.tick().await;
        let snapshot = match source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to fetch remote snapshot: {}", e);
                continue;
            }
        };

        match orchestrator.reconcile(snapshot).await {
            Ok(summary) => debug!("Reconcile pass: {:?}", summary),
            Err(e) => error!("Reconcile failed: {}", e),
        }
    }
}
