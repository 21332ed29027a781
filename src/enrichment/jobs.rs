//! Durable job records for enrichment attempts

use crate::catalog::{EnrichmentJob, JobId, JobStatus, WineId};
use crate::storage::{CatalogStore, StorageResult};
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;

/// Creates job rows and hands out handles for finishing them.
#[derive(Clone)]
pub struct JobRecorder {
    store: Arc<dyn CatalogStore>,
}

impl JobRecorder {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Insert a `processing` job for `wine_id`.
    pub fn start(&self, wine_id: &WineId) -> StorageResult<JobHandle> {
        let job = EnrichmentJob::start(wine_id.clone());
        self.store.create_job(&job)?;
        Ok(JobHandle {
            id: job.id,
            store: Arc::clone(&self.store),
        })
    }
}

/// A started job. Consumed by its terminal transition.
pub struct JobHandle {
    id: JobId,
    store: Arc<dyn CatalogStore>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Mark the job `completed`.
    pub fn complete(self) -> StorageResult<()> {
        self.finish(JobStatus::Completed, None)
    }

    /// Mark the job `failed` with `message`.
    pub fn fail(self, message: &str) -> StorageResult<()> {
        self.finish(JobStatus::Failed, Some(message))
    }

    fn finish(self, status: JobStatus, error: Option<&str>) -> StorageResult<()> {
        let updated = self.store.finish_job(&self.id, status, error, Utc::now())?;
        if !updated {
            warn!(job_id = %self.id, status = %status, "job was no longer processing; status left unchanged");
        }
        Ok(())
    }
}
