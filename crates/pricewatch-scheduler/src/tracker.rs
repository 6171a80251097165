//! Tracker: the entrypoints front-ends call: submit, confirm, cancel, list.
//!
//! Owns the store, the registry and the collaborators, and is the only
//! place that starts pollers.

use std::sync::Arc;

use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::traits::{Notifier, SnapshotFetcher};
use pricewatch_core::types::{Job, JobId, Snapshot};

use crate::policy::{TrackingPolicy, validate_target_price};
use crate::poller::Poller;
use crate::registry::JobRegistry;
use crate::store::JobStore;

/// How a confirmation names its job.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmKey {
    /// Deep-link token.
    Token(String),
    Id(JobId),
    /// Most recently submitted pending job.
    LatestPending,
}

/// Result of a submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job: Job,
    pub snapshot: Snapshot,
}

#[derive(Clone)]
pub struct Tracker {
    store: Arc<JobStore>,
    registry: JobRegistry,
    fetcher: Arc<dyn SnapshotFetcher>,
    notifier: Arc<dyn Notifier>,
    policy: Arc<TrackingPolicy>,
}

impl Tracker {
    pub fn new(
        store: Arc<JobStore>,
        fetcher: Arc<dyn SnapshotFetcher>,
        notifier: Arc<dyn Notifier>,
        policy: TrackingPolicy,
    ) -> Self {
        Self {
            store,
            registry: JobRegistry::new(),
            fetcher,
            notifier,
            policy: Arc::new(policy),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &TrackingPolicy {
        &self.policy
    }

    /// Fetch a snapshot without creating anything.
    pub async fn preview(&self, url: &str) -> Result<Snapshot> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PriceWatchError::Fetch("empty product URL".into()));
        }
        match tokio::time::timeout(self.policy.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(PriceWatchError::Fetch(format!(
                "timed out after {}s",
                self.policy.fetch_timeout.as_secs()
            ))),
        }
    }

    /// Submission entrypoint: snapshot the product and store a pending job.
    pub async fn submit(&self, url: &str, proposed_target: Option<f64>) -> Result<Submission> {
        let proposed_target = proposed_target.map(validate_target_price).transpose()?;
        let snapshot = self.preview(url).await?;
        let job = self.store.create_pending(
            &snapshot.title,
            url.trim(),
            snapshot.image.as_deref(),
            Some(snapshot.price),
            proposed_target,
        )?;
        Ok(Submission { job, snapshot })
    }

    /// Confirmation entrypoint: pending → active, then start the poller.
    ///
    /// Without an explicit `target` the target proposed at submission is used.
    /// Must be called from within a tokio runtime.
    pub fn confirm(&self, key: ConfirmKey, recipient: &str, target: Option<f64>) -> Result<Job> {
        let job = match &key {
            ConfirmKey::Token(token) => self.store.find_by_token(token)?,
            ConfirmKey::Id(id) => self
                .store
                .get(*id)?
                .ok_or_else(|| PriceWatchError::NotFound(format!("job #{id}")))?,
            ConfirmKey::LatestPending => self
                .store
                .latest_pending()?
                .ok_or_else(|| PriceWatchError::NotFound("no pending job".into()))?,
        };
        let target = target.or(job.proposed_target).ok_or_else(|| {
            PriceWatchError::InvalidTargetPrice("no target price given".into())
        })?;

        let job = self.store.activate(job.id, recipient, target)?;
        self.start_poller(job.id);
        Ok(job)
    }

    /// Cancellation entrypoint by id. `false` if it was already stopped.
    ///
    /// The poller notices at its next cycle.
    pub fn cancel(&self, id: JobId) -> Result<bool> {
        self.store.mark_stopped(id)
    }

    /// Cancellation entrypoint by recipient: stops their most recent active job.
    pub fn cancel_latest(&self, recipient: &str) -> Result<Job> {
        let job = self
            .store
            .latest_active_for(recipient)?
            .ok_or_else(|| PriceWatchError::NotFound(format!("no active job for {recipient}")))?;
        self.store.mark_stopped(job.id)?;
        Ok(job)
    }

    /// Listing entrypoint, most recent first.
    pub fn list(&self, recipient: &str) -> Result<Vec<Job>> {
        self.store.list_by_recipient(recipient)
    }

    /// Start a poller unless one is already registered. Returns whether one was started.
    pub fn start_poller(&self, job_id: JobId) -> bool {
        let Some(guard) = self.registry.try_acquire(job_id) else {
            tracing::debug!("Job #{job_id} already has a poller");
            return false;
        };
        let generation = guard.generation();
        let poller = Poller::new(
            job_id,
            self.store.clone(),
            self.fetcher.clone(),
            self.notifier.clone(),
            self.policy.clone(),
        );
        let handle = tokio::spawn(async move {
            let _guard = guard;
            poller.run().await
        });
        self.registry.attach(job_id, generation, handle.abort_handle());
        true
    }

    /// Start a poller for every active job that has none. Returns how many started.
    pub fn reconcile(&self) -> Result<usize> {
        let active = self.store.list_active()?;
        let started = active
            .iter()
            .filter(|job| self.start_poller(job.id))
            .count();
        if started > 0 {
            tracing::info!(
                "🔄 Reconciled {started} poller(s) ({} active job(s))",
                active.len()
            );
        }
        Ok(started)
    }

    /// Abort all pollers (process shutdown).
    pub fn shutdown(&self) -> usize {
        self.registry.shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingNotifier, ScriptedFetcher};
    use pricewatch_core::types::JobStatus;
    use std::time::Duration;

    fn idle_policy() -> TrackingPolicy {
        TrackingPolicy {
            poll_interval: Duration::from_secs(3600),
            fetch_timeout: Duration::from_millis(200),
            delivery_timeout: Duration::from_millis(200),
            notification_ceiling: 5,
            currency_symbol: "₹".into(),
        }
    }

    fn tracker_with(store: Arc<JobStore>) -> Tracker {
        Tracker::new(
            store,
            Arc::new(ScriptedFetcher::failing()),
            Arc::new(RecordingNotifier::default()),
            idle_policy(),
        )
    }

    fn tracker() -> Tracker {
        tracker_with(Arc::new(JobStore::open_in_memory().unwrap()))
    }

    fn pending(tracker: &Tracker, proposed: Option<f64>) -> Job {
        tracker
            .store()
            .create_pending("Kettle", "https://example.com/kettle", None, Some(1200.0), proposed)
            .unwrap()
    }

    #[tokio::test]
    async fn test_submit_creates_pending_job() {
        let tracker = Tracker::new(
            Arc::new(JobStore::open_in_memory().unwrap()),
            Arc::new(ScriptedFetcher::prices(&[1249.0])),
            Arc::new(RecordingNotifier::default()),
            idle_policy(),
        );
        let submission = tracker
            .submit(" https://example.com/kettle ", Some(999.0))
            .await
            .unwrap();
        let job = &submission.job;
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.url, "https://example.com/kettle");
        assert_eq!(job.current_price, Some(1249.0));
        assert_eq!(job.proposed_target, Some(999.0));
        assert!(job.target_price.is_none());
        assert!(tracker.registry().is_empty());

        // Fetch failure creates nothing
        assert!(matches!(
            tracker.submit("https://example.com/gone", None).await,
            Err(PriceWatchError::Fetch(_))
        ));
        assert_eq!(tracker.store().latest_pending().unwrap().unwrap().id, job.id);
    }

    #[tokio::test]
    async fn test_confirm_by_token_adopts_proposed_target() {
        let tracker = tracker();
        let job = pending(&tracker, Some(999.0));

        let active = tracker
            .confirm(ConfirmKey::Token(job.token.clone()), "chat-1", None)
            .unwrap();
        assert_eq!(active.status, JobStatus::Active);
        assert_eq!(active.target_price, Some(999.0));
        assert!(tracker.registry().contains(job.id));
        tracker.shutdown();
    }

    #[tokio::test]
    async fn test_confirm_requires_target() {
        let tracker = tracker();
        let job = pending(&tracker, None);

        assert!(matches!(
            tracker.confirm(ConfirmKey::Id(job.id), "chat-1", None),
            Err(PriceWatchError::InvalidTargetPrice(_))
        ));
        assert!(matches!(
            tracker.confirm(ConfirmKey::Id(job.id), "chat-1", Some(0.0)),
            Err(PriceWatchError::InvalidTargetPrice(_))
        ));
        assert!(matches!(
            tracker.confirm(ConfirmKey::Token("missing".into()), "chat-1", Some(5.0)),
            Err(PriceWatchError::NotFound(_))
        ));
        assert!(tracker.registry().is_empty());

        let active = tracker.confirm(ConfirmKey::LatestPending, "chat-1", Some(800.0)).unwrap();
        assert_eq!(active.id, job.id);
        tracker.shutdown();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_confirmations_single_winner() {
        let tracker = tracker();
        let job = pending(&tracker, None);

        let attempts: Vec<_> = (0..8)
            .map(|i| {
                let tracker = tracker.clone();
                let token = job.token.clone();
                tokio::spawn(async move {
                    tracker.confirm(ConfirmKey::Token(token), &format!("chat-{i}"), Some(900.0 + i as f64))
                })
            })
            .collect();

        let mut wins = Vec::new();
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(job) => wins.push(job),
                Err(e) => assert!(e.is_already_tracked(), "unexpected error: {e}"),
            }
        }
        assert_eq!(wins.len(), 1);
        let stored = tracker.store().get(job.id).unwrap().unwrap();
        assert_eq!(stored.recipient, wins[0].recipient);
        assert_eq!(stored.target_price, wins[0].target_price);
        assert_eq!(tracker.registry().len(), 1);
        tracker.shutdown();
    }

    #[tokio::test]
    async fn test_cancelled_pending_job_never_polls() {
        let tracker = tracker();
        let job = pending(&tracker, Some(999.0));

        assert!(tracker.cancel(job.id).unwrap());
        let err = tracker
            .confirm(ConfirmKey::Token(job.token.clone()), "chat-1", None)
            .unwrap_err();
        assert!(matches!(
            err,
            PriceWatchError::InvalidTransition { from: JobStatus::Stopped, .. }
        ));
        assert_eq!(tracker.reconcile().unwrap(), 0);
        assert!(tracker.registry().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_latest_and_list() {
        let tracker = tracker();
        let a = pending(&tracker, None);
        let b = pending(&tracker, None);
        tracker.confirm(ConfirmKey::Id(a.id), "chat-1", Some(10.0)).unwrap();
        tracker.confirm(ConfirmKey::Id(b.id), "chat-1", Some(10.0)).unwrap();

        let cancelled = tracker.cancel_latest("chat-1").unwrap();
        assert_eq!(cancelled.id, b.id);
        assert!(!tracker.cancel(b.id).unwrap());
        assert!(matches!(tracker.cancel_latest("chat-2"), Err(PriceWatchError::NotFound(_))));

        let statuses: Vec<_> = tracker.list("chat-1").unwrap().iter().map(|j| (j.id, j.status)).collect();
        assert_eq!(statuses, vec![(b.id, JobStatus::Stopped), (a.id, JobStatus::Active)]);
        tracker.shutdown();
    }

    #[tokio::test]
    async fn test_reconcile_after_restart() {
        let dir = std::env::temp_dir().join(format!("pricewatch-reconcile-{}", uuid::Uuid::new_v4()));
        let path = dir.join("jobs.db");
        {
            // Previous process: 3 active jobs, 1 pending, 1 stopped, then "crash"
            let store = JobStore::open(&path).unwrap();
            for i in 0..5 {
                let job = store
                    .create_pending(&format!("P{i}"), "https://example.com/p", None, None, None)
                    .unwrap();
                match i {
                    0..=2 => {
                        store.activate(job.id, "chat-1", 100.0).unwrap();
                    }
                    3 => {
                        store.mark_stopped(job.id).unwrap();
                    }
                    _ => {}
                }
            }
        }

        let tracker = tracker_with(Arc::new(JobStore::open(&path).unwrap()));
        assert!(tracker.registry().is_empty());
        assert_eq!(tracker.reconcile().unwrap(), 3);
        assert_eq!(tracker.registry().len(), 3);
        // Second pass finds nothing to do
        assert_eq!(tracker.reconcile().unwrap(), 0);
        assert_eq!(tracker.registry().len(), 3);

        assert_eq!(tracker.shutdown(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_poller_deregisters_when_job_stops() {
        let tracker = tracker();
        let job = pending(&tracker, None);
        tracker.confirm(ConfirmKey::Id(job.id), "chat-1", Some(10.0)).unwrap();
        assert!(tracker.registry().contains(job.id));

        // A fresh poller for a cancelled job exits on its first cycle
        tracker.shutdown();
        tracker.cancel(job.id).unwrap();
        assert!(tracker.start_poller(job.id));
        for _ in 0..100 {
            if !tracker.registry().contains(job.id) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!tracker.registry().contains(job.id));
    }

    #[tokio::test]
    async fn test_reconcile_surfaces_store_failure() {
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let tracker = tracker_with(store.clone());
        store.execute_for_test("DROP TABLE jobs").unwrap();

        assert!(matches!(tracker.reconcile(), Err(PriceWatchError::Store(_))));
        assert!(tracker.registry().is_empty());
    }
}
