//! Bounded background queue for fire-and-forget enrichments
//!
//! A single dispatcher task pulls wines off a bounded channel and runs at
//! most `max_concurrency` enrichments at once. Requests beyond the channel's
//! capacity are dropped by `trigger` or wait in `enqueue`.

use super::orchestrator::{EnrichmentOrchestrator, EnrichmentStatus};
use crate::catalog::{JobStatus, Wine, WineId};
use crate::storage::{CatalogStore, StorageResult};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Error recorded on jobs left `processing` by a previous run.
pub const INTERRUPTED_MESSAGE: &str = "interrupted before completion";

/// Handle to the running queue.
pub struct EnrichmentQueue {
    sender: mpsc::Sender<Wine>,
    shutdown: oneshot::Sender<()>,
    dispatcher: JoinHandle<usize>,
}

impl EnrichmentQueue {
    /// Spawn the dispatcher. Must be called inside a tokio runtime.
    pub fn start(
        orchestrator: EnrichmentOrchestrator,
        capacity: usize,
        max_concurrency: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (shutdown, shutdown_rx) = oneshot::channel();
        let dispatcher = tokio::spawn(dispatch(
            orchestrator,
            receiver,
            shutdown_rx,
            max_concurrency.max(1),
        ));

        info!(capacity, max_concurrency, "enrichment queue started");
        Self {
            sender,
            shutdown,
            dispatcher,
        }
    }

    pub(crate) fn sender(&self) -> mpsc::Sender<Wine> {
        self.sender.clone()
    }

    /// Queue without waiting. Returns false if the request was dropped.
    pub fn trigger(&self, wine: Wine) -> bool {
        try_enqueue(&self.sender, wine)
    }

    /// Queue, waiting for capacity. Returns false if the queue has stopped.
    pub async fn enqueue(&self, wine: Wine) -> bool {
        match self.sender.send(wine).await {
            Ok(()) => true,
            Err(mpsc::error::SendError(wine)) => {
                warn!(wine_id = %wine.id, "enrichment queue closed; request dropped");
                false
            }
        }
    }

    /// Stop accepting work, run everything already queued, and wait for it.
    ///
    /// Returns the number of enrichments the queue ran over its lifetime.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(());
        match self.dispatcher.await {
            Ok(processed) => {
                info!(processed, "enrichment queue stopped");
                processed
            }
            Err(e) => {
                error!(error = %e, "enrichment dispatcher panicked");
                0
            }
        }
    }
}

/// Non-blocking send; a full or closed queue drops the wine with a warning.
pub(crate) fn try_enqueue(sender: &mpsc::Sender<Wine>, wine: Wine) -> bool {
    match sender.try_send(wine) {
        Ok(()) => true,
        Err(TrySendError::Full(wine)) => {
            warn!(wine_id = %wine.id, "enrichment queue full; request dropped");
            false
        }
        Err(TrySendError::Closed(wine)) => {
            warn!(wine_id = %wine.id, "enrichment queue closed; request dropped");
            false
        }
    }
}

async fn dispatch(
    orchestrator: EnrichmentOrchestrator,
    mut receiver: mpsc::Receiver<Wine>,
    mut shutdown: oneshot::Receiver<()>,
    max_concurrency: usize,
) -> usize {
    let permits = Arc::new(Semaphore::new(max_concurrency));
    let mut tasks = JoinSet::new();
    let mut processed = 0usize;
    let mut draining = false;

    loop {
        let wine = if draining {
            receiver.recv().await
        } else {
            tokio::select! {
                wine = receiver.recv() => wine,
                _ = &mut shutdown => {
                    // Buffered requests are still delivered after close
                    receiver.close();
                    draining = true;
                    continue;
                }
            }
        };
        let Some(wine) = wine else { break };

        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!(error = %e, "enrichment task panicked");
            }
        }

        let orchestrator = orchestrator.clone();
        tasks.spawn(async move {
            let report = orchestrator.enrich(&wine).await;
            drop(permit);
            match report.status {
                EnrichmentStatus::AlreadyInProgress => {
                    debug!(wine_id = %wine.id, "queued enrichment skipped; already running")
                }
                ref status => {
                    info!(wine_id = %wine.id, status = status.label(), ratings = report.ratings_count(), "queued enrichment finished")
                }
            }
        });
        processed += 1;
    }

    while let Some(finished) = tasks.join_next().await {
        if let Err(e) = finished {
            error!(error = %e, "enrichment task panicked");
        }
    }
    processed
}

/// Fail every job still `processing` and return the affected wines.
///
/// Jobs left `processing` can only come from a run that stopped mid-flight,
/// so this must be called before any enrichment starts. The caller decides
/// whether to re-enqueue the returned wines.
pub fn recover_interrupted(store: &dyn CatalogStore) -> StorageResult<Vec<Wine>> {
    let stale = store.jobs_with_status(JobStatus::Processing)?;
    let mut seen: HashSet<WineId> = HashSet::new();
    let mut wines = Vec::new();

    for job in stale {
        store.finish_job(&job.id, JobStatus::Failed, Some(INTERRUPTED_MESSAGE), Utc::now())?;
        warn!(job_id = %job.id, wine_id = %job.wine_id, "failed interrupted enrichment job");

        if seen.insert(job.wine_id.clone()) {
            match store.load_wine(&job.wine_id)? {
                Some(wine) => wines.push(wine),
                None => debug!(wine_id = %job.wine_id, "interrupted job's wine no longer exists"),
            }
        }
    }

    Ok(wines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EnrichmentJob, WineCategory};
    use crate::storage::{OpenStore, SqliteStore};

    #[test]
    fn recover_fails_processing_jobs_once_per_wine() {
        let store = SqliteStore::open_in_memory().unwrap();
        let wine = Wine::new("Cerasuolo di Vittoria", WineCategory::Red, 26.0);
        store.save_wine(&wine).unwrap();
        let first = EnrichmentJob::start(wine.id.clone());
        let second = EnrichmentJob::start(wine.id.clone());
        store.create_job(&first).unwrap();
        store.create_job(&second).unwrap();

        let wines = recover_interrupted(&store).unwrap();

        assert_eq!(wines.len(), 1);
        assert_eq!(wines[0].id, wine.id);
        for job in store.jobs_for(&wine.id).unwrap() {
            assert_eq!(job.status, JobStatus::Failed);
            assert_eq!(job.error.as_deref(), Some(INTERRUPTED_MESSAGE));
        }
    }

    #[test]
    fn recover_leaves_finished_jobs_alone() {
        let store = SqliteStore::open_in_memory().unwrap();
        let wine = Wine::new("Verdicchio", WineCategory::White, 19.0);
        store.save_wine(&wine).unwrap();
        let job = EnrichmentJob::start(wine.id.clone());
        store.create_job(&job).unwrap();
        store.finish_job(&job.id, JobStatus::Completed, None, Utc::now()).unwrap();

        assert!(recover_interrupted(&store).unwrap().is_empty());
        assert_eq!(store.load_job(&job.id).unwrap().unwrap().status, JobStatus::Completed);
    }
}
