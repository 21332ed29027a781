//! SQLite storage backend for the catalog

use super::traits::{CatalogStore, OpenStore, StorageError, StorageResult};
use crate::catalog::{
    EnrichmentJob, FieldUpdates, JobId, JobStatus, RatingId, Wine, WineCategory, WineId,
    WineRating,
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::Mutex;

const WINE_COLUMNS: &str = "id, venue_id, name, producer, region, denomination, vintage, \
     grape_varieties_json, description, category, bottle_price, glass_price, available, recommended";

const RATING_COLUMNS: &str = "id, wine_id, source_id, source_name, score, confidence, year";

const JOB_COLUMNS: &str = "id, wine_id, status, error, created_at, completed_at";

/// SQLite-backed catalog store
///
/// Uses a single SQLite database file with tables for wines, wine_ratings,
/// and enrichment_jobs. Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Raw wine columns, before JSON and enum decoding
struct WineRow {
    id: String,
    venue_id: Option<String>,
    name: String,
    producer: Option<String>,
    region: Option<String>,
    denomination: Option<String>,
    vintage: Option<i32>,
    grapes_json: Option<String>,
    description: Option<String>,
    category: String,
    bottle_price: f64,
    glass_price: Option<f64>,
    available: bool,
    recommended: bool,
}

impl WineRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            venue_id: row.get(1)?,
            name: row.get(2)?,
            producer: row.get(3)?,
            region: row.get(4)?,
            denomination: row.get(5)?,
            vintage: row.get(6)?,
            grapes_json: row.get(7)?,
            description: row.get(8)?,
            category: row.get(9)?,
            bottle_price: row.get(10)?,
            glass_price: row.get(11)?,
            available: row.get(12)?,
            recommended: row.get(13)?,
        })
    }
}

/// Raw job columns, before status and date decoding
struct JobRow {
    id: String,
    wine_id: String,
    status: String,
    error: Option<String>,
    created_at: String,
    completed_at: Option<String>,
}

impl JobRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            wine_id: row.get(1)?,
            status: row.get(2)?,
            error: row.get(3)?,
            created_at: row.get(4)?,
            completed_at: row.get(5)?,
        })
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    // Fixed width so lexical order matches chronological order
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::DateParse(e.to_string()))
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Wines table (catalog items; owned by catalog management)
            CREATE TABLE IF NOT EXISTS wines (
                id TEXT PRIMARY KEY,
                venue_id TEXT,
                name TEXT NOT NULL,
                producer TEXT,
                region TEXT,
                denomination TEXT,
                vintage INTEGER,
                grape_varieties_json TEXT,
                description TEXT,
                category TEXT NOT NULL
                    CHECK (category IN ('red', 'white', 'rose', 'sparkling', 'dessert')),
                bottle_price REAL NOT NULL,
                glass_price REAL,
                available INTEGER NOT NULL DEFAULT 1,
                recommended INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_wines_venue
                ON wines(venue_id);

            -- Ratings inferred by the enrichment pipeline
            CREATE TABLE IF NOT EXISTS wine_ratings (
                id TEXT PRIMARY KEY,
                wine_id TEXT NOT NULL,
                source_id TEXT NOT NULL,
                source_name TEXT NOT NULL,
                score TEXT NOT NULL,
                confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
                year INTEGER,
                FOREIGN KEY (wine_id) REFERENCES wines(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_ratings_wine
                ON wine_ratings(wine_id);

            -- One row per enrichment attempt
            CREATE TABLE IF NOT EXISTS enrichment_jobs (
                id TEXT PRIMARY KEY,
                wine_id TEXT NOT NULL,
                status TEXT NOT NULL
                    CHECK (status IN ('processing', 'completed', 'failed')),
                error TEXT,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                FOREIGN KEY (wine_id) REFERENCES wines(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_wine
                ON enrichment_jobs(wine_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_status
                ON enrichment_jobs(status);

            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;

        Ok(())
    }

    fn row_to_wine(row: WineRow) -> StorageResult<Wine> {
        let category: WineCategory = row
            .category
            .parse()
            .map_err(|e: crate::catalog::CategoryParseError| StorageError::InvalidValue(e.to_string()))?;
        let grape_varieties = match row.grapes_json {
            Some(json) => Some(serde_json::from_str::<Vec<String>>(&json)?),
            None => None,
        };

        Ok(Wine {
            id: WineId::from_string(row.id),
            venue_id: row.venue_id,
            name: row.name,
            producer: row.producer,
            region: row.region,
            denomination: row.denomination,
            vintage: row.vintage,
            grape_varieties,
            description: row.description,
            category,
            bottle_price: row.bottle_price,
            glass_price: row.glass_price,
            available: row.available,
            recommended: row.recommended,
        })
    }

    fn row_to_rating(row: &Row<'_>) -> rusqlite::Result<WineRating> {
        Ok(WineRating {
            id: RatingId::from_string(row.get::<_, String>(0)?),
            wine_id: WineId::from_string(row.get::<_, String>(1)?),
            source_id: row.get(2)?,
            source_name: row.get(3)?,
            score: row.get(4)?,
            confidence: row.get(5)?,
            year: row.get(6)?,
        })
    }

    fn row_to_job(row: JobRow) -> StorageResult<EnrichmentJob> {
        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| StorageError::InvalidValue(format!("job status '{}'", row.status)))?;
        let completed_at = match row.completed_at {
            Some(ref raw) => Some(parse_time(raw)?),
            None => None,
        };

        Ok(EnrichmentJob {
            id: JobId::from_string(row.id),
            wine_id: WineId::from_string(row.wine_id),
            status,
            error: row.error,
            created_at: parse_time(&row.created_at)?,
            completed_at,
        })
    }

    fn query_jobs(
        conn: &Connection,
        sql: &str,
        param: &str,
    ) -> StorageResult<Vec<EnrichmentJob>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![param], JobRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::row_to_job).collect()
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CatalogStore for SqliteStore {
    // === Wine Operations ===

    fn save_wine(&self, wine: &Wine) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let grapes_json = match wine.grape_varieties {
            Some(ref grapes) => Some(serde_json::to_string(grapes)?),
            None => None,
        };

        // Upsert rather than REPLACE: REPLACE deletes the row first, which
        // would cascade into ratings and jobs.
        conn.execute(
            r#"
            INSERT INTO wines (id, venue_id, name, producer, region, denomination, vintage,
                               grape_varieties_json, description, category, bottle_price,
                               glass_price, available, recommended)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                venue_id = excluded.venue_id,
                name = excluded.name,
                producer = excluded.producer,
                region = excluded.region,
                denomination = excluded.denomination,
                vintage = excluded.vintage,
                grape_varieties_json = excluded.grape_varieties_json,
                description = excluded.description,
                category = excluded.category,
                bottle_price = excluded.bottle_price,
                glass_price = excluded.glass_price,
                available = excluded.available,
                recommended = excluded.recommended
            "#,
            params![
                wine.id.as_str(),
                wine.venue_id,
                wine.name,
                wine.producer,
                wine.region,
                wine.denomination,
                wine.vintage,
                grapes_json,
                wine.description,
                wine.category.as_str(),
                wine.bottle_price,
                wine.glass_price,
                wine.available,
                wine.recommended,
            ],
        )?;

        Ok(())
    }

    fn load_wine(&self, id: &WineId) -> StorageResult<Option<Wine>> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                &format!("SELECT {} FROM wines WHERE id = ?1", WINE_COLUMNS),
                params![id.as_str()],
                WineRow::read,
            )
            .optional()?;

        row.map(Self::row_to_wine).transpose()
    }

    fn list_wines(&self) -> StorageResult<Vec<Wine>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wines ORDER BY name COLLATE NOCASE, id",
            WINE_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], WineRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::row_to_wine).collect()
    }

    fn update_wine_fields(
        &self,
        id: &WineId,
        updates: &FieldUpdates,
    ) -> StorageResult<Option<Wine>> {
        let mut conn = self.conn.lock().unwrap();
        // Write lock is held from the emptiness check through the update
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let row = tx
            .query_row(
                &format!("SELECT {} FROM wines WHERE id = ?1", WINE_COLUMNS),
                params![id.as_str()],
                WineRow::read,
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut wine = Self::row_to_wine(row)?;

        let fill = updates.restricted_to(&wine);
        if !fill.is_empty() {
            let grapes_json = match fill.grape_varieties {
                Some(ref grapes) => Some(serde_json::to_string(grapes)?),
                None => None,
            };
            tx.execute(
                r#"
                UPDATE wines SET
                    description = COALESCE(?2, description),
                    region = COALESCE(?3, region),
                    denomination = COALESCE(?4, denomination),
                    grape_varieties_json = COALESCE(?5, grape_varieties_json)
                WHERE id = ?1
                "#,
                params![
                    id.as_str(),
                    fill.description,
                    fill.region,
                    fill.denomination,
                    grapes_json,
                ],
            )?;
            fill.apply_to(&mut wine);
        }

        tx.commit()?;
        Ok(Some(wine))
    }

    // === Rating Operations ===

    fn insert_rating(&self, rating: &WineRating) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO wine_ratings ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                RATING_COLUMNS
            ),
            params![
                rating.id.as_str(),
                rating.wine_id.as_str(),
                rating.source_id,
                rating.source_name,
                rating.score,
                rating.confidence,
                rating.year,
            ],
        )?;
        Ok(())
    }

    fn ratings_for(&self, wine_id: &WineId) -> StorageResult<Vec<WineRating>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wine_ratings WHERE wine_id = ?1 ORDER BY rowid",
            RATING_COLUMNS
        ))?;
        let ratings = stmt
            .query_map(params![wine_id.as_str()], Self::row_to_rating)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ratings)
    }

    fn delete_ratings(&self, wine_id: &WineId) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "DELETE FROM wine_ratings WHERE wine_id = ?1",
            params![wine_id.as_str()],
        )?;
        Ok(rows)
    }

    // === Job Operations ===

    fn create_job(&self, job: &EnrichmentJob) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO enrichment_jobs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                JOB_COLUMNS
            ),
            params![
                job.id.as_str(),
                job.wine_id.as_str(),
                job.status.as_str(),
                job.error,
                format_time(&job.created_at),
                job.completed_at.as_ref().map(format_time),
            ],
        )?;
        Ok(())
    }

    fn finish_job(
        &self,
        id: &JobId,
        status: JobStatus,
        error: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        if !status.is_terminal() {
            return Err(StorageError::InvalidTransition(format!(
                "job {} cannot move back to {}",
                id, status
            )));
        }

        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE enrichment_jobs SET status = ?2, error = ?3, completed_at = ?4
             WHERE id = ?1 AND status = 'processing'",
            params![id.as_str(), status.as_str(), error, format_time(&completed_at)],
        )?;
        Ok(rows > 0)
    }

    fn load_job(&self, id: &JobId) -> StorageResult<Option<EnrichmentJob>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM enrichment_jobs WHERE id = ?1", JOB_COLUMNS),
                params![id.as_str()],
                JobRow::read,
            )
            .optional()?;
        row.map(Self::row_to_job).transpose()
    }

    fn latest_job(&self, wine_id: &WineId) -> StorageResult<Option<EnrichmentJob>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM enrichment_jobs WHERE wine_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    JOB_COLUMNS
                ),
                params![wine_id.as_str()],
                JobRow::read,
            )
            .optional()?;
        row.map(Self::row_to_job).transpose()
    }

    fn jobs_for(&self, wine_id: &WineId) -> StorageResult<Vec<EnrichmentJob>> {
        let conn = self.conn.lock().unwrap();
        Self::query_jobs(
            &conn,
            &format!(
                "SELECT {} FROM enrichment_jobs WHERE wine_id = ?1 ORDER BY created_at, rowid",
                JOB_COLUMNS
            ),
            wine_id.as_str(),
        )
    }

    fn jobs_with_status(&self, status: JobStatus) -> StorageResult<Vec<EnrichmentJob>> {
        let conn = self.conn.lock().unwrap();
        Self::query_jobs(
            &conn,
            &format!(
                "SELECT {} FROM enrichment_jobs WHERE status = ?1 ORDER BY created_at, rowid",
                JOB_COLUMNS
            ),
            status.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RatingSource;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn create_test_wine(name: &str) -> Wine {
        Wine::new(name, WineCategory::Red, 45.0)
            .with_producer("Cantina Test")
            .with_vintage(2019)
    }

    fn gambero() -> RatingSource {
        RatingSource::new("gambero-rosso", "Gambero Rosso")
    }

    // ========================================================================
    // Wines
    // ========================================================================

    #[test]
    fn test_save_and_load_wine() {
        let store = create_test_store();
        let wine = create_test_wine("Barbaresco")
            .with_grapes(["Nebbiolo"])
            .with_glass_price(12.5)
            .with_venue("enoteca-1");

        store.save_wine(&wine).unwrap();
        let loaded = store.load_wine(&wine.id).unwrap().unwrap();

        assert_eq!(loaded, wine);
    }

    #[test]
    fn test_load_missing_wine_returns_none() {
        let store = create_test_store();
        assert!(store.load_wine(&WineId::from("nope")).unwrap().is_none());
    }

    #[test]
    fn test_list_wines_sorted_by_name() {
        let store = create_test_store();
        store.save_wine(&create_test_wine("zibibbo")).unwrap();
        store.save_wine(&create_test_wine("Amarone")).unwrap();

        let names: Vec<String> = store.list_wines().unwrap().into_iter().map(|w| w.name).collect();
        assert_eq!(names, vec!["Amarone", "zibibbo"]);
    }

    #[test]
    fn test_resaving_wine_keeps_ratings() {
        let store = create_test_store();
        let mut wine = create_test_wine("Chianti");
        store.save_wine(&wine).unwrap();
        store
            .insert_rating(&WineRating::new(wine.id.clone(), &gambero(), "2 Bicchieri", 0.8))
            .unwrap();

        wine.recommended = true;
        store.save_wine(&wine).unwrap();

        assert_eq!(store.ratings_for(&wine.id).unwrap().len(), 1);
        assert!(store.load_wine(&wine.id).unwrap().unwrap().recommended);
    }

    #[test]
    fn test_update_fields_fills_only_empty_columns() {
        let store = create_test_store();
        let wine = create_test_wine("Etna Rosso").with_region("Sicilia");
        store.save_wine(&wine).unwrap();

        let updates = FieldUpdates {
            region: Some("Calabria".to_string()),
            denomination: Some("Etna DOC".to_string()),
            grape_varieties: Some(vec!["Nerello Mascalese".to_string()]),
            ..Default::default()
        };
        let stored = store.update_wine_fields(&wine.id, &updates).unwrap().unwrap();

        let loaded = store.load_wine(&wine.id).unwrap().unwrap();
        assert_eq!(stored, loaded);
        assert_eq!(loaded.region.as_deref(), Some("Sicilia"));
        assert_eq!(loaded.denomination.as_deref(), Some("Etna DOC"));
        assert_eq!(
            loaded.grape_varieties,
            Some(vec!["Nerello Mascalese".to_string()])
        );
        assert!(loaded.description.is_none());
    }

    #[test]
    fn test_update_fields_fills_blank_grape_list() {
        let store = create_test_store();
        let wine = create_test_wine("Grillo").with_grapes([" ", ""]);
        store.save_wine(&wine).unwrap();

        let updates = FieldUpdates {
            grape_varieties: Some(vec!["Grillo".to_string()]),
            ..Default::default()
        };
        let stored = store.update_wine_fields(&wine.id, &updates).unwrap().unwrap();

        assert_eq!(stored.grape_varieties, Some(vec!["Grillo".to_string()]));
        let loaded = store.load_wine(&wine.id).unwrap().unwrap();
        assert_eq!(loaded.grape_varieties, stored.grape_varieties);
    }

    #[test]
    fn test_update_fields_returns_stored_row_when_nothing_is_empty() {
        let store = create_test_store();
        let wine = create_test_wine("Frappato").with_region("Sicilia");
        store.save_wine(&wine).unwrap();

        let updates = FieldUpdates {
            region: Some("Calabria".to_string()),
            ..Default::default()
        };
        let stored = store.update_wine_fields(&wine.id, &updates).unwrap().unwrap();

        assert_eq!(stored, wine);
    }

    #[test]
    fn test_update_fields_on_missing_wine_returns_none() {
        let store = create_test_store();
        let updates = FieldUpdates {
            region: Some("Toscana".to_string()),
            ..Default::default()
        };
        assert!(store
            .update_wine_fields(&WineId::from("ghost"), &updates)
            .unwrap()
            .is_none());
    }

    // ========================================================================
    // Ratings
    // ========================================================================

    #[test]
    fn test_insert_list_and_delete_ratings() {
        let store = create_test_store();
        let wine = create_test_wine("Brunello");
        store.save_wine(&wine).unwrap();

        let first = WineRating::new(wine.id.clone(), &gambero(), "Tre Bicchieri", 0.9)
            .with_year(Some(2023));
        let second = WineRating::new(
            wine.id.clone(),
            &RatingSource::new("james-suckling", "James Suckling"),
            "96/100",
            0.75,
        );
        store.insert_rating(&first).unwrap();
        store.insert_rating(&second).unwrap();

        let ratings = store.ratings_for(&wine.id).unwrap();
        assert_eq!(ratings, vec![first, second]);

        assert_eq!(store.delete_ratings(&wine.id).unwrap(), 2);
        assert!(store.ratings_for(&wine.id).unwrap().is_empty());
    }

    #[test]
    fn test_rating_for_unknown_wine_is_rejected() {
        let store = create_test_store();
        let rating = WineRating::new(WineId::from("ghost"), &gambero(), "90", 0.9);
        assert!(matches!(
            store.insert_rating(&rating),
            Err(StorageError::Database(_))
        ));
    }

    // ========================================================================
    // Jobs
    // ========================================================================

    #[test]
    fn test_job_lifecycle() {
        let store = create_test_store();
        let wine = create_test_wine("Taurasi");
        store.save_wine(&wine).unwrap();

        let job = EnrichmentJob::start(wine.id.clone());
        store.create_job(&job).unwrap();
        assert_eq!(
            store.load_job(&job.id).unwrap().unwrap().status,
            JobStatus::Processing
        );

        assert!(store
            .finish_job(&job.id, JobStatus::Failed, Some("model offline"), Utc::now())
            .unwrap());

        let loaded = store.load_job(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Failed);
        assert_eq!(loaded.error.as_deref(), Some("model offline"));
        assert!(loaded.completed_at.is_some());
    }

    #[test]
    fn test_terminal_job_is_not_updated_again() {
        let store = create_test_store();
        let wine = create_test_wine("Aglianico");
        store.save_wine(&wine).unwrap();
        let job = EnrichmentJob::start(wine.id.clone());
        store.create_job(&job).unwrap();

        assert!(store.finish_job(&job.id, JobStatus::Completed, None, Utc::now()).unwrap());
        assert!(!store
            .finish_job(&job.id, JobStatus::Failed, Some("late"), Utc::now())
            .unwrap());
        assert_eq!(
            store.load_job(&job.id).unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[test]
    fn test_finish_job_rejects_processing_target() {
        let store = create_test_store();
        let err = store
            .finish_job(&JobId::new(), JobStatus::Processing, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidTransition(_)));
    }

    #[test]
    fn test_latest_job_is_most_recent() {
        let store = create_test_store();
        let wine = create_test_wine("Sagrantino");
        store.save_wine(&wine).unwrap();

        let mut older = EnrichmentJob::start(wine.id.clone());
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = EnrichmentJob::start(wine.id.clone());
        store.create_job(&newer).unwrap();
        store.create_job(&older).unwrap();

        assert_eq!(store.latest_job(&wine.id).unwrap().unwrap().id, newer.id);
        assert_eq!(store.jobs_for(&wine.id).unwrap().len(), 2);
        assert!(store.latest_job(&WineId::from("none")).unwrap().is_none());
    }

    #[test]
    fn test_jobs_with_status() {
        let store = create_test_store();
        let wine = create_test_wine("Lagrein");
        store.save_wine(&wine).unwrap();
        let done = EnrichmentJob::start(wine.id.clone());
        let stuck = EnrichmentJob::start(wine.id.clone());
        store.create_job(&done).unwrap();
        store.create_job(&stuck).unwrap();
        store.finish_job(&done.id, JobStatus::Completed, None, Utc::now()).unwrap();

        let processing = store.jobs_with_status(JobStatus::Processing).unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].id, stuck.id);
    }

    #[test]
    fn test_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vintner.db");
        let wine = create_test_wine("Greco di Tufo");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_wine(&wine).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.load_wine(&wine.id).unwrap().unwrap().name, "Greco di Tufo");
    }

    #[test]
    fn test_wal_mode_enabled_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("wal.db")).unwrap();
        let conn = store.conn.lock().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
