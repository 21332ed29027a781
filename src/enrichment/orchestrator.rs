//! End-to-end enrichment of a single wine
//!
//! `enrich` and `refresh` never return an error: every outcome, including
//! write failures after the model answered, is reported in an
//! `EnrichmentReport`. The job row is the durable record of the attempt.

use super::filter::filter_ratings;
use super::guard::InFlightGuard;
use super::jobs::{JobHandle, JobRecorder};
use super::merge::merge_fields;
use super::parser::{parse_payload, EnrichmentPayload};
use super::prompt::build_prompt;
use super::queue::{try_enqueue, EnrichmentQueue};
use super::retry::RetryPolicy;
use crate::catalog::{EnrichmentJob, JobId, Wine, WineId, WineRating};
use crate::config::EnrichmentConfig;
use crate::llm::LanguageModelClient;
use crate::storage::{CatalogStore, StorageResult};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

/// A write that failed after the model answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    /// Which write: `insert_rating`, `delete_ratings`, `update_wine_fields`, `complete_job`
    pub operation: &'static str,
    pub message: String,
}

impl WriteFailure {
    fn new(operation: &'static str, message: impl ToString) -> Self {
        Self {
            operation,
            message: message.to_string(),
        }
    }
}

/// How an enrichment attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EnrichmentStatus {
    /// Job completed and every write succeeded
    Completed,
    /// Job completed but some writes failed
    CompletedWithWriteFailures { failures: Vec<WriteFailure> },
    /// Model call or reply parsing failed; job marked failed
    Failed { reason: String },
    /// The job row could not be created; nothing was attempted
    Aborted { reason: String },
    /// Another enrichment of the same wine is running
    AlreadyInProgress,
}

impl EnrichmentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::CompletedWithWriteFailures { .. } => "completed_with_write_failures",
            Self::Failed { .. } => "failed",
            Self::Aborted { .. } => "aborted",
            Self::AlreadyInProgress => "already_in_progress",
        }
    }
}

/// Result of `enrich` or `refresh`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentReport {
    /// The wine with merged fields applied, if the merge write succeeded
    pub wine: Wine,
    /// Ratings actually persisted
    pub ratings: Vec<WineRating>,
    pub job_id: Option<JobId>,
    pub status: EnrichmentStatus,
}

impl EnrichmentReport {
    fn without_job(wine: &Wine, status: EnrichmentStatus) -> Self {
        Self {
            wine: wine.clone(),
            ratings: Vec::new(),
            job_id: None,
            status,
        }
    }

    pub fn ratings_count(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            EnrichmentStatus::Completed | EnrichmentStatus::CompletedWithWriteFailures { .. }
        )
    }
}

/// Runs the enrichment pipeline against a store and a model client.
///
/// Cheap to clone; clones share the store, client, and in-flight set.
#[derive(Clone)]
pub struct EnrichmentOrchestrator {
    store: Arc<dyn CatalogStore>,
    client: Arc<dyn LanguageModelClient>,
    config: Arc<EnrichmentConfig>,
    retry: RetryPolicy,
    jobs: JobRecorder,
    guard: InFlightGuard,
    queue: Option<mpsc::Sender<Wine>>,
}

impl EnrichmentOrchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        client: Arc<dyn LanguageModelClient>,
        config: EnrichmentConfig,
    ) -> Self {
        let retry = RetryPolicy::new(config.max_attempts, config.base_delay);
        Self {
            jobs: JobRecorder::new(Arc::clone(&store)),
            store,
            client,
            config: Arc::new(config),
            retry,
            guard: InFlightGuard::new(),
            queue: None,
        }
    }

    /// Start the background queue sized from the configuration.
    ///
    /// Returns an orchestrator whose `trigger_async` feeds the queue, and the
    /// queue itself for `enqueue` and `shutdown`. Must be called inside a
    /// tokio runtime.
    pub fn start_queue(mut self) -> (Self, EnrichmentQueue) {
        let queue = EnrichmentQueue::start(
            self.clone(),
            self.config.queue_capacity,
            self.config.max_concurrency,
        );
        self.queue = Some(queue.sender());
        (self, queue)
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn config(&self) -> &EnrichmentConfig {
        &self.config
    }

    pub fn guard(&self) -> &InFlightGuard {
        &self.guard
    }

    /// Enrich `wine`: infer ratings and fill missing descriptive fields.
    #[instrument(skip_all, fields(wine_id = %wine.id))]
    pub async fn enrich(&self, wine: &Wine) -> EnrichmentReport {
        let Some(_slot) = self.guard.try_acquire(&wine.id) else {
            info!("enrichment already in progress; request rejected");
            return EnrichmentReport::without_job(wine, EnrichmentStatus::AlreadyInProgress);
        };

        self.run(wine, Vec::new()).await
    }

    /// Replace `wine`'s ratings with a fresh enrichment.
    ///
    /// Existing ratings are deleted first. A failed deletion is reported but
    /// does not stop the enrichment.
    #[instrument(skip_all, fields(wine_id = %wine.id))]
    pub async fn refresh(&self, wine: &Wine) -> EnrichmentReport {
        let Some(_slot) = self.guard.try_acquire(&wine.id) else {
            info!("enrichment already in progress; refresh rejected");
            return EnrichmentReport::without_job(wine, EnrichmentStatus::AlreadyInProgress);
        };

        let mut write_failures = Vec::new();
        match self.store.delete_ratings(&wine.id) {
            Ok(deleted) => info!(deleted, "cleared previous ratings"),
            Err(e) => {
                warn!(error = %e, "failed to delete previous ratings; continuing");
                write_failures.push(WriteFailure::new("delete_ratings", e));
            }
        }

        self.run(wine, write_failures).await
    }

    /// Hand `wine` to the background queue and return immediately.
    ///
    /// Never blocks. A full or stopped queue drops the request with a warning.
    pub fn trigger_async(&self, wine: Wine) {
        let Some(ref sender) = self.queue else {
            warn!(wine_id = %wine.id, "no enrichment queue running; request dropped");
            return;
        };

        try_enqueue(sender, wine);
    }

    /// Most recent job for the wine.
    pub fn job_status(&self, wine_id: &WineId) -> StorageResult<Option<EnrichmentJob>> {
        self.store.latest_job(wine_id)
    }

    async fn run(&self, wine: &Wine, mut write_failures: Vec<WriteFailure>) -> EnrichmentReport {
        let handle = match self.jobs.start(&wine.id) {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "could not record enrichment job; aborting");
                return EnrichmentReport::without_job(
                    wine,
                    EnrichmentStatus::Aborted {
                        reason: e.to_string(),
                    },
                );
            }
        };
        let job_id = handle.id().clone();

        let payload = match self.infer(wine).await {
            Ok(payload) => payload,
            Err(reason) => {
                warn!(job_id = %job_id, reason = %reason, "enrichment failed");
                if let Err(e) = handle.fail(&reason) {
                    warn!(job_id = %job_id, error = %e, "failed to mark job failed");
                }
                return EnrichmentReport {
                    wine: wine.clone(),
                    ratings: Vec::new(),
                    job_id: Some(job_id),
                    status: EnrichmentStatus::Failed { reason },
                };
            }
        };

        let ratings = self.persist_ratings(wine, &payload, &mut write_failures);
        let merged = self.merge(wine, &payload, &mut write_failures);
        self.finish(handle, &mut write_failures);

        info!(
            job_id = %job_id,
            ratings = ratings.len(),
            write_failures = write_failures.len(),
            "enrichment completed"
        );

        let status = if write_failures.is_empty() {
            EnrichmentStatus::Completed
        } else {
            EnrichmentStatus::CompletedWithWriteFailures {
                failures: write_failures,
            }
        };

        EnrichmentReport {
            wine: merged,
            ratings,
            job_id: Some(job_id),
            status,
        }
    }

    /// Prompt, call with retry, parse. Errors are rendered for the job row.
    async fn infer(&self, wine: &Wine) -> Result<EnrichmentPayload, String> {
        let request = build_prompt(wine, &self.config.whitelist);
        let response = self
            .retry
            .call(self.client.as_ref(), &request)
            .await
            .map_err(|e| e.to_string())?;
        parse_payload(&response.content).map_err(|e| e.to_string())
    }

    fn persist_ratings(
        &self,
        wine: &Wine,
        payload: &EnrichmentPayload,
        write_failures: &mut Vec<WriteFailure>,
    ) -> Vec<WineRating> {
        let kept = filter_ratings(
            payload.ratings.clone(),
            self.config.min_confidence,
            &self.config.whitelist,
        );

        let mut persisted = Vec::with_capacity(kept.len());
        for inferred in kept {
            // Always present: the filter kept only whitelisted ids
            let Some(source) = self.config.whitelist.get(&inferred.source_id) else {
                continue;
            };
            let rating = WineRating::new(wine.id.clone(), source, inferred.score, inferred.confidence)
                .with_year(inferred.year);

            match self.store.insert_rating(&rating) {
                Ok(()) => persisted.push(rating),
                Err(e) => {
                    warn!(source_id = %rating.source_id, error = %e, "failed to persist rating");
                    write_failures.push(WriteFailure::new("insert_rating", e));
                }
            }
        }
        persisted
    }

    fn merge(
        &self,
        wine: &Wine,
        payload: &EnrichmentPayload,
        write_failures: &mut Vec<WriteFailure>,
    ) -> Wine {
        let updates = merge_fields(wine, payload);
        if updates.is_empty() {
            return wine.clone();
        }

        match self.store.update_wine_fields(&wine.id, &updates) {
            Ok(Some(stored)) => {
                info!(fields = ?updates.field_names(), "merged wine fields");
                stored
            }
            Ok(None) => {
                warn!("wine disappeared before fields could be merged");
                write_failures.push(WriteFailure::new("update_wine_fields", "wine not found"));
                wine.clone()
            }
            Err(e) => {
                warn!(error = %e, "failed to merge wine fields");
                write_failures.push(WriteFailure::new("update_wine_fields", e));
                wine.clone()
            }
        }
    }

    fn finish(&self, handle: JobHandle, write_failures: &mut Vec<WriteFailure>) {
        let job_id = handle.id().clone();
        if let Err(e) = handle.complete() {
            warn!(job_id = %job_id, error = %e, "failed to mark job completed");
            write_failures.push(WriteFailure::new("complete_job", e));
        }
    }
}
