//! Vintner CLI: wine catalog enrichment with MCP server.
//!
//! Usage:
//!   vintner mcp [--transport stdio] [--db path]
//!   vintner wine <add|list|show> [--db path]
//!   vintner enrich|refresh|status <wine-id> [--db path]
//!   vintner enrich-all [--incomplete-only] [--db path]
//!   vintner recover [--db path]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vintner::enrichment::recover_interrupted;
use vintner::mcp::{open_orchestrator, report_json};
use vintner::{
    CatalogStore, EnrichmentOrchestrator, JobStatus, OpenStore, SqliteStore, Wine, WineCategory,
    WineId,
};

#[derive(Parser)]
#[command(
    name = "vintner",
    version,
    about = "Wine catalog enrichment: inferred ratings and missing descriptive fields"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP (Model Context Protocol) server
    Mcp {
        /// Transport type (currently only stdio)
        #[arg(long, default_value = "stdio")]
        transport: String,
        /// Path to SQLite database file
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Manage catalog wines
    Wine {
        #[command(subcommand)]
        action: WineAction,
        /// Path to SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
    /// Enrich one wine now and print the outcome
    Enrich {
        wine_id: String,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Delete a wine's ratings and enrich it again
    Refresh {
        wine_id: String,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Enrich every wine through the bounded background queue
    EnrichAll {
        /// Skip wines whose descriptive fields are all filled
        #[arg(long)]
        incomplete_only: bool,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show the most recent enrichment job for a wine
    Status {
        wine_id: String,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Fail jobs left processing by a stopped process (only safe while no MCP server is using the database)
    ///
    /// Every job still processing is treated as interrupted, including a live
    /// server's. The MCP server runs the same recovery itself at startup.
    Recover {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum WineAction {
    /// Add a wine to the catalog
    Add {
        name: String,
        /// red, white, rose, sparkling, or dessert
        #[arg(long)]
        category: WineCategory,
        /// Bottle price
        #[arg(long)]
        price: f64,
        #[arg(long)]
        producer: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        denomination: Option<String>,
        #[arg(long)]
        vintage: Option<i32>,
        /// Comma-separated grape varieties
        #[arg(long)]
        grapes: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        glass_price: Option<f64>,
        #[arg(long)]
        venue: Option<String>,
    },
    /// List all wines
    List {
        /// Only wines still missing descriptive fields
        #[arg(long)]
        incomplete_only: bool,
    },
    /// Show a wine and its ratings
    Show { wine_id: String },
}

/// Get the default database path (~/.local/share/vintner/vintner.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let vintner_dir = data_dir.join("vintner");
    std::fs::create_dir_all(&vintner_dir).ok();
    vintner_dir.join("vintner.db")
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create tokio runtime: {}", e))
}

fn load_wine(store: &dyn CatalogStore, wine_id: &str) -> Result<Wine, String> {
    store
        .load_wine(&WineId::from(wine_id))
        .map_err(|e| format!("Failed to load wine: {}", e))?
        .ok_or_else(|| format!("wine '{}' not found", wine_id))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| e.to_string())?;
    println!("{}", text);
    Ok(())
}

fn exit_with(result: Result<i32, String>) -> ! {
    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog commands
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn cmd_wine_add(
    store: &SqliteStore,
    name: String,
    category: WineCategory,
    price: f64,
    producer: Option<String>,
    region: Option<String>,
    denomination: Option<String>,
    vintage: Option<i32>,
    grapes: Option<String>,
    description: Option<String>,
    glass_price: Option<f64>,
    venue: Option<String>,
) -> Result<i32, String> {
    let mut wine = Wine::new(name, category, price);
    wine.producer = producer;
    wine.region = region;
    wine.denomination = denomination;
    wine.vintage = vintage;
    wine.grape_varieties = grapes.map(|g| {
        g.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    });
    wine.description = description;
    wine.glass_price = glass_price;
    wine.venue_id = venue;

    store.save_wine(&wine).map_err(|e| e.to_string())?;
    println!("Added wine '{}' ({})", wine.name, wine.id);
    Ok(0)
}

fn cmd_wine_list(store: &SqliteStore, incomplete_only: bool) -> Result<i32, String> {
    let wines = store.list_wines().map_err(|e| e.to_string())?;
    let wines: Vec<Wine> = wines
        .into_iter()
        .filter(|w| !incomplete_only || w.is_incomplete())
        .collect();

    if wines.is_empty() {
        println!("No wines");
        return Ok(0);
    }
    for wine in wines {
        let vintage = wine.vintage.map(|v| v.to_string()).unwrap_or_else(|| "NV".to_string());
        let marker = if wine.is_incomplete() { " *" } else { "" };
        println!("{}  {} {} ({}){}", wine.id, wine.name, vintage, wine.category, marker);
    }
    Ok(0)
}

fn cmd_wine_show(store: &SqliteStore, wine_id: &str) -> Result<i32, String> {
    let wine = load_wine(store, wine_id)?;
    let ratings = store.ratings_for(&wine.id).map_err(|e| e.to_string())?;
    print_json(&serde_json::json!({ "wine": wine, "ratings": ratings }))?;
    Ok(0)
}

fn cmd_status(store: &SqliteStore, wine_id: &str) -> Result<i32, String> {
    match store.latest_job(&WineId::from(wine_id)).map_err(|e| e.to_string())? {
        Some(job) => {
            print_json(&job)?;
            Ok(0)
        }
        None => Err(format!("no enrichment job for wine '{}'", wine_id)),
    }
}

fn cmd_recover(store: &SqliteStore) -> Result<i32, String> {
    let wines = recover_interrupted(store).map_err(|e| e.to_string())?;
    if wines.is_empty() {
        println!("No interrupted jobs");
    } else {
        println!("Failed interrupted jobs for {} wine(s):", wines.len());
        for wine in wines {
            println!("  {}  {}", wine.id, wine.name);
        }
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Enrichment commands
// ---------------------------------------------------------------------------

fn cmd_enrich(db: Option<PathBuf>, wine_id: &str, refresh: bool) -> Result<i32, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let orchestrator = open_orchestrator(&db_path)?;
    let wine = load_wine(&**orchestrator.store(), wine_id)?;

    let report = runtime()?.block_on(async {
        if refresh {
            orchestrator.refresh(&wine).await
        } else {
            orchestrator.enrich(&wine).await
        }
    });

    print_json(&report_json(&report))?;
    Ok(if report.is_success() { 0 } else { 1 })
}

fn cmd_enrich_all(db: Option<PathBuf>, incomplete_only: bool) -> Result<i32, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let orchestrator = open_orchestrator(&db_path)?;
    let wines: Vec<Wine> = orchestrator
        .store()
        .list_wines()
        .map_err(|e| e.to_string())?
        .into_iter()
        .filter(|w| !incomplete_only || w.is_incomplete())
        .collect();

    if wines.is_empty() {
        println!("No wines to enrich");
        return Ok(0);
    }

    let ids: Vec<WineId> = wines.iter().map(|w| w.id.clone()).collect();
    runtime()?.block_on(async {
        let (_, queue) = orchestrator.clone().start_queue();
        for wine in wines {
            queue.enqueue(wine).await;
        }
        queue.shutdown().await;
    });

    summarize(&orchestrator, &db_path, &ids)
}

fn summarize(
    orchestrator: &EnrichmentOrchestrator,
    db_path: &Path,
    ids: &[WineId],
) -> Result<i32, String> {
    let (mut completed, mut failed) = (0usize, 0usize);
    for id in ids {
        match orchestrator.job_status(id).map_err(|e| e.to_string())? {
            Some(job) if job.status == JobStatus::Completed => completed += 1,
            _ => failed += 1,
        }
    }
    println!(
        "Enriched {} wine(s) in {}: {} completed, {} failed",
        ids.len(),
        db_path.display(),
        completed,
        failed
    );
    Ok(if failed == 0 { 0 } else { 1 })
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Mcp { transport, db } => {
            if transport != "stdio" {
                eprintln!("error: only 'stdio' transport is currently supported");
                std::process::exit(1);
            }
            let db_path = db.unwrap_or_else(default_db_path);
            let code = vintner::mcp::run_mcp_server(db_path);
            std::process::exit(code);
        }
        Commands::Wine { action, db } => {
            let store = match open_store(db) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let result = match action {
                WineAction::Add {
                    name,
                    category,
                    price,
                    producer,
                    region,
                    denomination,
                    vintage,
                    grapes,
                    description,
                    glass_price,
                    venue,
                } => cmd_wine_add(
                    &store,
                    name,
                    category,
                    price,
                    producer,
                    region,
                    denomination,
                    vintage,
                    grapes,
                    description,
                    glass_price,
                    venue,
                ),
                WineAction::List { incomplete_only } => cmd_wine_list(&store, incomplete_only),
                WineAction::Show { wine_id } => cmd_wine_show(&store, &wine_id),
            };
            exit_with(result);
        }
        Commands::Enrich { wine_id, db } => exit_with(cmd_enrich(db, &wine_id, false)),
        Commands::Refresh { wine_id, db } => exit_with(cmd_enrich(db, &wine_id, true)),
        Commands::EnrichAll {
            incomplete_only,
            db,
        } => exit_with(cmd_enrich_all(db, incomplete_only)),
        Commands::Status { wine_id, db } => {
            exit_with(open_store(db).and_then(|store| cmd_status(&store, &wine_id)))
        }
        Commands::Recover { db } => exit_with(open_store(db).and_then(|store| cmd_recover(&store))),
    }
}
