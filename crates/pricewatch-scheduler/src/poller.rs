//! Per-job poller: the loop that watches one product until its job stops.
//!
//! A poller holds no job state between cycles: every cycle starts by
//! re-reading the job, which is also how it notices cancellation.

use std::sync::Arc;

use pricewatch_core::error::PriceWatchError;
use pricewatch_core::traits::{Notifier, SnapshotFetcher};
use pricewatch_core::types::{Job, JobId, JobStatus, Snapshot};

use crate::messages;
use crate::policy::TrackingPolicy;
use crate::store::JobStore;

/// Why a poller exited.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Job no longer in the store.
    Missing,
    /// Job observed in a non-active state (cancelled, or never active).
    Inactive(JobStatus),
    /// Cancelled between the status check and the alert.
    Cancelled,
    /// Alert budget used up; the poller stopped the job.
    CeilingReached(u32),
    /// Active job without a target or recipient.
    Incomplete,
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Sleep, then run another cycle.
    Continue,
    Finished(StopReason),
}

/// One job's polling loop.
pub struct Poller {
    job_id: JobId,
    store: Arc<JobStore>,
    fetcher: Arc<dyn SnapshotFetcher>,
    notifier: Arc<dyn Notifier>,
    policy: Arc<TrackingPolicy>,
}

impl Poller {
    pub fn new(
        job_id: JobId,
        store: Arc<JobStore>,
        fetcher: Arc<dyn SnapshotFetcher>,
        notifier: Arc<dyn Notifier>,
        policy: Arc<TrackingPolicy>,
    ) -> Self {
        Self {
            job_id,
            store,
            fetcher,
            notifier,
            policy,
        }
    }

    /// Run cycles until the job stops. Cycles never overlap.
    pub async fn run(self) -> StopReason {
        tracing::info!(
            "📡 Poller started for job #{} (every {}s)",
            self.job_id,
            self.policy.poll_interval.as_secs()
        );
        loop {
            match self.cycle().await {
                CycleOutcome::Continue => tokio::time::sleep(self.policy.poll_interval).await,
                CycleOutcome::Finished(reason) => {
                    tracing::info!("📴 Poller for job #{} finished: {reason:?}", self.job_id);
                    return reason;
                }
            }
        }
    }

    /// One polling cycle: status check → snapshot → policy.
    pub async fn cycle(&self) -> CycleOutcome {
        let job = match self.store.get(self.job_id) {
            Ok(Some(job)) => job,
            Ok(None) => return CycleOutcome::Finished(StopReason::Missing),
            Err(e) => {
                tracing::warn!("⚠️ Job #{}: store unavailable, skipping cycle: {e}", self.job_id);
                return CycleOutcome::Continue;
            }
        };
        if job.status != JobStatus::Active {
            return CycleOutcome::Finished(StopReason::Inactive(job.status));
        }
        let (Some(target), Some(recipient)) = (job.target_price, job.recipient.clone()) else {
            tracing::warn!("⚠️ Job #{} is active without target/recipient", job.id);
            return CycleOutcome::Finished(StopReason::Incomplete);
        };

        // A previous run may have died between the last alert and the stop
        if self.policy.ceiling_reached(job.notification_count) {
            return self.stop_exhausted(job.notification_count);
        }

        let snapshot = match self.fetch(&job.url).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("⚠️ Job #{}: {e}; retrying next cycle", job.id);
                return CycleOutcome::Continue;
            }
        };

        if let Err(e) = self.store.record_observation(job.id, &snapshot) {
            tracing::warn!("⚠️ Job #{}: could not record price, skipping cycle: {e}", job.id);
            return CycleOutcome::Continue;
        }

        if !job.is_triggered_by(snapshot.price) {
            tracing::debug!(
                "ℹ️ Job #{} {}: {} (target {})",
                job.id,
                job.title,
                snapshot.price,
                target
            );
            return CycleOutcome::Continue;
        }

        self.alert(&job, &recipient, &snapshot).await
    }

    async fn fetch(&self, url: &str) -> pricewatch_core::Result<Snapshot> {
        match tokio::time::timeout(self.policy.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(PriceWatchError::Fetch(format!(
                "timed out after {}s",
                self.policy.fetch_timeout.as_secs()
            ))),
        }
    }

    /// Delivery is bounded so a stuck channel cannot stall the loop.
    async fn deliver(
        &self,
        recipient: &str,
        text: &str,
        image: Option<&str>,
    ) -> pricewatch_core::Result<()> {
        let send = self.notifier.send(recipient, text, image);
        match tokio::time::timeout(self.policy.delivery_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(PriceWatchError::Delivery(format!(
                "timed out after {}ms",
                self.policy.delivery_timeout.as_millis()
            ))),
        }
    }

    async fn alert(&self, job: &Job, recipient: &str, snapshot: &Snapshot) -> CycleOutcome {
        let count = match self.store.increment_notification(job.id) {
            Ok(Some(count)) => count,
            Ok(None) => return CycleOutcome::Finished(StopReason::Cancelled),
            Err(e) => {
                tracing::warn!("⚠️ Job #{}: could not count alert, skipping: {e}", job.id);
                return CycleOutcome::Continue;
            }
        };

        let ceiling = self.policy.notification_ceiling;
        tracing::info!(
            "🎯 Job #{} at {} ≤ target — alert {count}/{ceiling}",
            job.id,
            snapshot.price
        );
        let text = messages::price_alert(
            job,
            snapshot.price,
            count,
            ceiling,
            &self.policy.currency_symbol,
        );
        let image = snapshot.image.as_deref().or(job.image.as_deref());
        if let Err(e) = self.deliver(recipient, &text, image).await {
            tracing::warn!("⚠️ Job #{}: alert delivery via {} failed: {e}", job.id, self.notifier.name());
        }

        if self.policy.ceiling_reached(count) {
            return self.stop_exhausted(count);
        }
        CycleOutcome::Continue
    }

    fn stop_exhausted(&self, count: u32) -> CycleOutcome {
        match self.store.mark_stopped(self.job_id) {
            Ok(_) => CycleOutcome::Finished(StopReason::CeilingReached(count)),
            Err(e) => {
                tracing::warn!("⚠️ Job #{}: could not stop after {count} alerts: {e}", self.job_id);
                CycleOutcome::Continue
            }
        }
    }
}
