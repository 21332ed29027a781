//! Common test utilities for the enrichment integration tests
//!
//! Provides catalog fixtures, a store wrapper that fails chosen writes on
//! demand, and a model client that records how many calls overlap.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vintner::{
    CatalogStore, ChatRequest, ChatResponse, EnrichmentConfig, EnrichmentJob, EnrichmentOrchestrator,
    FieldUpdates, JobId, JobStatus, LanguageModelClient, LlmError, OpenStore, SqliteStore,
    StorageError, StorageResult, Wine, WineCategory, WineId, WineRating,
};

// ============================================================================
// Fixtures
// ============================================================================

/// A model reply with one rating per interesting case: kept, low confidence,
/// unknown source.
pub const MIXED_REPLY: &str = r#"Sure! Here is the data:
```json
{
  "ratings": [
    {"source_id": "gambero-rosso", "source_name": "Gambero Rosso", "score": "Tre Bicchieri", "confidence": 0.9, "year": 2023},
    {"source_id": "veronelli", "source_name": "Veronelli", "score": "3 stelle", "confidence": 0.3},
    {"source_id": "unknown", "source_name": "Some Blog", "score": "95", "confidence": 0.95}
  ],
  "region": "Piemonte",
  "denomination": "Barolo DOCG",
  "grape_varieties": ["Nebbiolo"],
  "tasting_notes": "Rose petals, tar, firm tannins.",
  "food_pairing": "Brasato al Barolo"
}
```"#;

/// A bare Barolo missing every descriptive field.
pub fn bare_wine() -> Wine {
    Wine::new("Barolo Bussia", WineCategory::Red, 95.0)
        .with_producer("Prunotto")
        .with_vintage(2018)
}

/// Config with millisecond backoff so retries don't slow the suite.
pub fn fast_config() -> EnrichmentConfig {
    EnrichmentConfig::default().with_base_delay(Duration::from_millis(5))
}

pub fn store_with(wines: &[Wine]) -> Arc<FlakyStore> {
    let store = FlakyStore::new();
    for wine in wines {
        store.save_wine(wine).unwrap();
    }
    Arc::new(store)
}

pub fn orchestrator(
    store: Arc<FlakyStore>,
    client: Arc<dyn LanguageModelClient>,
    config: EnrichmentConfig,
) -> EnrichmentOrchestrator {
    EnrichmentOrchestrator::new(store, client, config)
}

/// Every job for the wine must have left `processing`.
pub fn assert_no_processing_jobs(store: &dyn CatalogStore, wine_id: &WineId) {
    for job in store.jobs_for(wine_id).unwrap() {
        assert_ne!(job.status, JobStatus::Processing, "job {} left processing", job.id);
    }
}

// ============================================================================
// FlakyStore
// ============================================================================

/// Which writes `FlakyStore` should fail.
#[derive(Default)]
pub struct Faults {
    pub create_job: AtomicBool,
    pub insert_rating: AtomicBool,
    pub delete_ratings: AtomicBool,
    pub update_wine_fields: AtomicBool,
    pub finish_job: AtomicBool,
}

/// In-memory SQLite store that fails selected writes on demand.
pub struct FlakyStore {
    inner: SqliteStore,
    pub faults: Faults,
}

fn injected(operation: &str) -> StorageError {
    StorageError::Io(std::io::Error::other(format!("injected {} failure", operation)))
}

fn check(flag: &AtomicBool, operation: &str) -> StorageResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(injected(operation))
    } else {
        Ok(())
    }
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            faults: Faults::default(),
        }
    }
}

impl CatalogStore for FlakyStore {
    fn save_wine(&self, wine: &Wine) -> StorageResult<()> {
        self.inner.save_wine(wine)
    }

    fn load_wine(&self, id: &WineId) -> StorageResult<Option<Wine>> {
        self.inner.load_wine(id)
    }

    fn list_wines(&self) -> StorageResult<Vec<Wine>> {
        self.inner.list_wines()
    }

    fn update_wine_fields(
        &self,
        id: &WineId,
        updates: &FieldUpdates,
    ) -> StorageResult<Option<Wine>> {
        check(&self.faults.update_wine_fields, "update_wine_fields")?;
        self.inner.update_wine_fields(id, updates)
    }

    fn insert_rating(&self, rating: &WineRating) -> StorageResult<()> {
        check(&self.faults.insert_rating, "insert_rating")?;
        self.inner.insert_rating(rating)
    }

    fn ratings_for(&self, wine_id: &WineId) -> StorageResult<Vec<WineRating>> {
        self.inner.ratings_for(wine_id)
    }

    fn delete_ratings(&self, wine_id: &WineId) -> StorageResult<usize> {
        check(&self.faults.delete_ratings, "delete_ratings")?;
        self.inner.delete_ratings(wine_id)
    }

    fn create_job(&self, job: &EnrichmentJob) -> StorageResult<()> {
        check(&self.faults.create_job, "create_job")?;
        self.inner.create_job(job)
    }

    fn finish_job(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        check(&self.faults.finish_job, "finish_job")?;
        self.inner.finish_job(id, status, error, completed_at)
    }

    fn load_job(&self, id: &JobId) -> StorageResult<Option<EnrichmentJob>> {
        self.inner.load_job(id)
    }

    fn latest_job(&self, wine_id: &WineId) -> StorageResult<Option<EnrichmentJob>> {
        self.inner.latest_job(wine_id)
    }

    fn jobs_for(&self, wine_id: &WineId) -> StorageResult<Vec<EnrichmentJob>> {
        self.inner.jobs_for(wine_id)
    }

    fn jobs_with_status(&self, status: JobStatus) -> StorageResult<Vec<EnrichmentJob>> {
        self.inner.jobs_with_status(status)
    }
}

// ============================================================================
// ProbeClient
// ============================================================================

/// Answers every call with `reply` after `delay`, tracking peak overlap.
pub struct ProbeClient {
    reply: String,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ProbeClient {
    pub fn new(reply: impl Into<String>, delay: Duration) -> Self {
        Self {
            reply: reply.into(),
            delay,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModelClient for ProbeClient {
    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(ChatResponse::text(self.reply.clone()))
    }

    fn model_name(&self) -> &str {
        "probe"
    }
}
