//! Catalog records touched by the enrichment pipeline

mod job;
mod rating;
mod wine;

pub use job::{EnrichmentJob, JobId, JobStatus};
pub use rating::{RatingId, RatingSource, SourceWhitelist, WineRating};
pub use wine::{CategoryParseError, FieldUpdates, Wine, WineCategory, WineId};
