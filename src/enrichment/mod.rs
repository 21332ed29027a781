//! Enrichment pipeline
//!
//! Fills a wine's missing descriptive fields and attaches professional
//! ratings inferred by a language model. Each attempt is recorded as a
//! durable job; only whitelisted sources above a confidence threshold are
//! persisted, and existing wine data is never overwritten.

pub mod filter;
mod guard;
mod jobs;
pub mod merge;
mod orchestrator;
pub mod parser;
pub mod prompt;
mod queue;
pub mod retry;

pub use filter::filter_ratings;
pub use guard::{InFlightGuard, InFlightSlot};
pub use jobs::{JobHandle, JobRecorder};
pub use merge::merge_fields;
pub use orchestrator::{EnrichmentOrchestrator, EnrichmentReport, EnrichmentStatus, WriteFailure};
pub use parser::{parse_payload, EnrichmentPayload, InferredRating, ParseError};
pub use prompt::build_prompt;
pub use queue::{recover_interrupted, EnrichmentQueue, INTERRUPTED_MESSAGE};
pub use retry::RetryPolicy;
