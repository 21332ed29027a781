//! MCP server for Vintner: exposes wine enrichment and catalog lookups
//! via the Model Context Protocol.
//!
//! Tools: 4 enrichment + 2 catalog = 6 total.

pub mod params;

use params::*;
use crate::enrichment::{recover_interrupted, EnrichmentReport};
use crate::{
    CatalogStore, EnrichmentConfig, EnrichmentOrchestrator, HttpChatClient, LlmConfig, OpenStore,
    SqliteStore, Wine, WineId,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ok_text(text: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn err_text(msg: String) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg)]))
}

fn ok_json<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    match serde_json::to_string_pretty(value) {
        Ok(text) => ok_text(text),
        Err(e) => err_text(e.to_string()),
    }
}

/// Tool payload for a finished enrichment.
pub fn report_json(report: &EnrichmentReport) -> serde_json::Value {
    let mut value = serde_json::json!({
        "success": report.is_success(),
        "ratings_count": report.ratings_count(),
        "status": report.status.label(),
        "job_id": report.job_id.as_ref().map(|id| id.to_string()),
    });
    if let Ok(detail) = serde_json::to_value(&report.status) {
        value["detail"] = detail;
    }
    value
}

/// Open the store and build an orchestrator from `VINTNER_*` settings.
pub fn open_orchestrator(db_path: &Path) -> Result<EnrichmentOrchestrator, String> {
    let config =
        EnrichmentConfig::from_env().map_err(|e| format!("Invalid configuration: {}", e))?;
    let llm_config =
        LlmConfig::from_env().map_err(|e| format!("Invalid model configuration: {}", e))?;
    let client = HttpChatClient::new(&llm_config)
        .map_err(|e| format!("Failed to create model client: {}", e))?;
    let store = SqliteStore::open(db_path)
        .map_err(|e| format!("Failed to open database at {}: {}", db_path.display(), e))?;

    Ok(EnrichmentOrchestrator::new(
        Arc::new(store),
        Arc::new(client),
        config,
    ))
}

// ---------------------------------------------------------------------------
// VintnerMcpServer
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct VintnerMcpServer {
    orchestrator: EnrichmentOrchestrator,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl VintnerMcpServer {
    pub fn new(orchestrator: EnrichmentOrchestrator) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }

    fn store(&self) -> &Arc<dyn CatalogStore> {
        self.orchestrator.store()
    }

    /// Load a wine, mapping both "missing" and store errors to a message.
    fn find_wine(&self, wine_id: &str) -> Result<Wine, String> {
        match self.store().load_wine(&WineId::from(wine_id)) {
            Ok(Some(wine)) => Ok(wine),
            Ok(None) => Err(format!("wine '{}' not found", wine_id)),
            Err(e) => {
                error!(wine_id, error = %e, "failed to load wine");
                Err("failed to load wine".to_string())
            }
        }
    }

    // ── Enrichment tools ────────────────────────────────────────────────

    #[tool(description = "Enrich a wine now: infer missing region, denomination, grapes, description and professional ratings")]
    async fn wine_enrich(
        &self,
        Parameters(p): Parameters<WineIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let wine = match self.find_wine(&p.wine_id) {
            Ok(wine) => wine,
            Err(msg) => return err_text(msg),
        };
        let report = self.orchestrator.enrich(&wine).await;
        ok_json(&report_json(&report))
    }

    #[tool(description = "Delete a wine's ratings and enrich it again")]
    async fn wine_refresh(
        &self,
        Parameters(p): Parameters<WineIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let wine = match self.find_wine(&p.wine_id) {
            Ok(wine) => wine,
            Err(msg) => return err_text(msg),
        };
        let report = self.orchestrator.refresh(&wine).await;
        ok_json(&report_json(&report))
    }

    #[tool(description = "Queue a wine for background enrichment and return immediately; poll with enrichment_status")]
    fn wine_enrich_async(
        &self,
        Parameters(p): Parameters<WineIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let wine = match self.find_wine(&p.wine_id) {
            Ok(wine) => wine,
            Err(msg) => return err_text(msg),
        };
        self.orchestrator.trigger_async(wine);
        ok_json(&serde_json::json!({ "success": true, "queued": p.wine_id }))
    }

    #[tool(description = "Status of the most recent enrichment job for a wine")]
    fn enrichment_status(
        &self,
        Parameters(p): Parameters<WineIdParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.orchestrator.job_status(&WineId::from(p.wine_id.as_str())) {
            Ok(Some(job)) => ok_json(&job),
            Ok(None) => err_text(format!("no enrichment job for wine '{}'", p.wine_id)),
            Err(e) => {
                error!(wine_id = %p.wine_id, error = %e, "failed to load job status");
                err_text("failed to load job status".to_string())
            }
        }
    }

    // ── Catalog tools ───────────────────────────────────────────────────

    #[tool(description = "Get a wine with its persisted ratings")]
    fn wine_get(
        &self,
        Parameters(p): Parameters<WineIdParams>,
    ) -> Result<CallToolResult, McpError> {
        let wine = match self.find_wine(&p.wine_id) {
            Ok(wine) => wine,
            Err(msg) => return err_text(msg),
        };
        match self.store().ratings_for(&wine.id) {
            Ok(ratings) => ok_json(&serde_json::json!({ "wine": wine, "ratings": ratings })),
            Err(e) => {
                error!(wine_id = %wine.id, error = %e, "failed to load ratings");
                err_text("failed to load ratings".to_string())
            }
        }
    }

    #[tool(description = "List wines, optionally only one venue's or only those missing descriptive fields")]
    fn wine_list(
        &self,
        Parameters(p): Parameters<WineListParams>,
    ) -> Result<CallToolResult, McpError> {
        let wines = match self.store().list_wines() {
            Ok(wines) => wines,
            Err(e) => return err_text(e.to_string()),
        };
        let incomplete_only = p.incomplete_only.unwrap_or(false);
        let wines: Vec<Wine> = wines
            .into_iter()
            .filter(|w| p.venue_id.is_none() || w.venue_id == p.venue_id)
            .filter(|w| !incomplete_only || w.is_incomplete())
            .collect();
        ok_json(&wines)
    }
}

#[tool_handler]
impl ServerHandler for VintnerMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Vintner MCP server: wine enrichment (ratings and missing descriptive fields) with job tracking"
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run_mcp_server(db_path: PathBuf) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let orchestrator = match open_orchestrator(&db_path) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("{}", e);
                return 1;
            }
        };

        // The server owns the database while it runs, so anything still
        // processing was left by a previous process.
        let interrupted = match recover_interrupted(orchestrator.store().as_ref()) {
            Ok(wines) => wines,
            Err(e) => {
                eprintln!("failed to recover interrupted jobs: {}", e);
                return 1;
            }
        };

        let (orchestrator, queue) = orchestrator.start_queue();
        if !interrupted.is_empty() {
            info!(count = interrupted.len(), "re-queueing interrupted enrichments");
        }
        for wine in interrupted {
            orchestrator.trigger_async(wine);
        }

        let server = VintnerMcpServer::new(orchestrator);

        info!(db = %db_path.display(), "vintner mcp server starting on stdio");

        let service = match server.serve(rmcp::transport::stdio()).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("failed to start MCP server: {}", e);
                queue.shutdown().await;
                return 1;
            }
        };

        let code = match service.waiting().await {
            Ok(_) => 0,
            Err(e) => {
                eprintln!("MCP server error: {}", e);
                1
            }
        };

        let processed = queue.shutdown().await;
        info!(processed, "vintner mcp server stopped");
        code
    })
}
