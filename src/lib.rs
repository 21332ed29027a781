//! Vintner: wine catalog enrichment pipeline
//!
//! Given a wine with incomplete metadata, asks a generative language model
//! for missing descriptive fields and professional ratings, keeps only
//! confident ratings from recognized guides, fills in fields the wine lacks
//! without overwriting anything, and records every attempt as a durable job.
//!
//! # Core Concepts
//!
//! - **Wines**: catalog items owned by a venue; the pipeline only fills
//!   their empty descriptive fields
//! - **Ratings**: scores attributed to whitelisted guides, each with a
//!   confidence in 0.0..=1.0
//! - **Jobs**: one row per enrichment attempt, `processing` until it ends
//!   `completed` or `failed`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vintner::{EnrichmentConfig, EnrichmentOrchestrator, MockClient, OpenStore, SqliteStore};
//!
//! # async fn demo() {
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let client = Arc::new(MockClient::replying("{\"ratings\": []}"));
//! let orchestrator = EnrichmentOrchestrator::new(store, client, EnrichmentConfig::default());
//! # }
//! ```

pub mod catalog;
pub mod config;
pub mod enrichment;
pub mod llm;
pub mod mcp;
pub mod storage;

pub use catalog::{
    EnrichmentJob, FieldUpdates, JobId, JobStatus, RatingId, RatingSource, SourceWhitelist, Wine,
    WineCategory, WineId, WineRating,
};
pub use config::{ConfigError, EnrichmentConfig, LlmConfig};
pub use enrichment::{
    EnrichmentOrchestrator, EnrichmentQueue, EnrichmentReport, EnrichmentStatus, RetryPolicy,
    WriteFailure,
};
pub use llm::{ChatMessage, ChatRequest, ChatResponse, HttpChatClient, LanguageModelClient, LlmError, MockClient};
pub use storage::{CatalogStore, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
