//! Periodic reconciler: safety net that re-attaches pollers to active jobs.

use std::time::Duration;

use crate::tracker::Tracker;

/// Run `Tracker::reconcile` every `every`. The first tick fires immediately,
/// so this also covers the startup pass.
pub async fn spawn_reconciler(tracker: Tracker, every: Duration) {
    tracing::info!("🔄 Reconciler started (every {}s)", every.as_secs());

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match tracker.reconcile() {
            Ok(started) => tracing::debug!(
                "Reconcile pass: {started} started, {} running",
                tracker.registry().len()
            ),
            Err(e) => tracing::warn!("⚠️ Reconcile pass failed: {e}"),
        }
    }
}
