//! Job registry: in-process guard against running two pollers for one job.
//!
//! Never persisted: after a restart the reconciler rebuilds it from the store.

use chrono::{DateTime, Utc};
use pricewatch_core::types::JobId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::AbortHandle;

struct Entry {
    generation: u64,
    abort: Option<AbortHandle>,
    started_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<JobId, Entry>,
    next_generation: u64,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    // Entries stay consistent even if a holder panicked
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

/// Map of job id → running poller.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<Inner>>,
}

/// Proof that the holder won registration for a job.
///
/// Move it into the poller task; dropping it (normal exit, panic or abort)
/// removes the registry entry.
pub struct PollerGuard {
    job_id: JobId,
    generation: u64,
    inner: Arc<Mutex<Inner>>,
}

/// Registry entry as seen from outside.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PollerInfo {
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the poller slot for `job_id`. Only one concurrent caller gets `Some`.
    pub fn try_acquire(&self, job_id: JobId) -> Option<PollerGuard> {
        let mut inner = lock(&self.inner);
        if inner.entries.contains_key(&job_id) {
            return None;
        }
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.entries.insert(
            job_id,
            Entry {
                generation,
                abort: None,
                started_at: Utc::now(),
            },
        );
        Some(PollerGuard {
            job_id,
            generation,
            inner: self.inner.clone(),
        })
    }

    /// Attach the spawned task's abort handle. Ignored if that poller already exited.
    pub fn attach(&self, job_id: JobId, generation: u64, abort: AbortHandle) {
        let mut inner = lock(&self.inner);
        if let Some(entry) = inner.entries.get_mut(&job_id)
            && entry.generation == generation
        {
            entry.abort = Some(abort);
        }
    }

    pub fn contains(&self, job_id: JobId) -> bool {
        lock(&self.inner).entries.contains_key(&job_id)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Running pollers, ordered by job id.
    pub fn snapshot(&self) -> Vec<PollerInfo> {
        let mut list: Vec<PollerInfo> = lock(&self.inner)
            .entries
            .iter()
            .map(|(id, e)| PollerInfo {
                job_id: *id,
                started_at: e.started_at,
            })
            .collect();
        list.sort_by_key(|p| p.job_id);
        list
    }

    /// Abort every poller and clear the map. Returns how many were running.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<Entry> = lock(&self.inner).entries.drain().map(|(_, e)| e).collect();
        for entry in &drained {
            if let Some(abort) = &entry.abort {
                abort.abort();
            }
        }
        if !drained.is_empty() {
            tracing::info!("⏹️ Aborted {} poller(s)", drained.len());
        }
        drained.len()
    }
}

impl PollerGuard {
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for PollerGuard {
    fn drop(&mut self) {
        let mut inner = lock(&self.inner);
        if inner
            .entries
            .get(&self.job_id)
            .is_some_and(|e| e.generation == self.generation)
        {
            inner.entries.remove(&self.job_id);
        }
    }
}
