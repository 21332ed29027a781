//! Storage backends for the catalog
//!
//! The pipeline talks to storage through the `CatalogStore` trait.
//! The primary implementation is `SqliteStore` for persistent storage.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CatalogStore, OpenStore, StorageError, StorageResult};
