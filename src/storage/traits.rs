//! Storage trait definitions

use crate::catalog::{EnrichmentJob, FieldUpdates, JobId, JobStatus, Wine, WineId, WineRating};
use chrono::{DateTime, Utc};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Wine not found: {0}")]
    WineNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("Invalid job transition: {0}")]
    InvalidTransition(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for catalog storage backends: wines, their ratings, and
/// enrichment jobs.
///
/// Implementations must be thread-safe (Send + Sync) to support
/// concurrent enrichments from multiple tasks.
pub trait CatalogStore: Send + Sync {
    // === Wine Operations ===

    /// Save a wine (insert or replace every column)
    fn save_wine(&self, wine: &Wine) -> StorageResult<()>;

    /// Load a wine by ID
    fn load_wine(&self, id: &WineId) -> StorageResult<Option<Wine>>;

    /// List all wines, ordered by name
    fn list_wines(&self) -> StorageResult<Vec<Wine>>;

    /// Fill descriptive fields that are still empty in the stored row.
    ///
    /// Emptiness is judged the same way as `Wine::region_missing` and friends.
    /// Fields already populated in storage are left untouched even when the
    /// update carries a value for them. Returns the stored wine after the
    /// write, or `None` if the wine doesn't exist.
    fn update_wine_fields(
        &self,
        id: &WineId,
        updates: &FieldUpdates,
    ) -> StorageResult<Option<Wine>>;

    // === Rating Operations ===

    /// Insert a rating row
    fn insert_rating(&self, rating: &WineRating) -> StorageResult<()>;

    /// All ratings for a wine
    fn ratings_for(&self, wine_id: &WineId) -> StorageResult<Vec<WineRating>>;

    /// Delete every rating for a wine, returning how many were removed
    fn delete_ratings(&self, wine_id: &WineId) -> StorageResult<usize>;

    // === Job Operations ===

    /// Insert a new job row
    fn create_job(&self, job: &EnrichmentJob) -> StorageResult<()>;

    /// Move a `processing` job to a terminal status.
    ///
    /// Returns false when the job doesn't exist or has already left
    /// `processing`; a terminal job is never updated again.
    fn finish_job(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Load a job by ID
    fn load_job(&self, id: &JobId) -> StorageResult<Option<EnrichmentJob>>;

    /// The most recently created job for a wine
    fn latest_job(&self, wine_id: &WineId) -> StorageResult<Option<EnrichmentJob>>;

    /// Every job for a wine, oldest first
    fn jobs_for(&self, wine_id: &WineId) -> StorageResult<Vec<EnrichmentJob>>;

    /// Every job currently in `status`, oldest first
    fn jobs_with_status(&self, status: JobStatus) -> StorageResult<Vec<EnrichmentJob>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: CatalogStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
