//! MCP tool parameter structs with schemars-derived JSON schemas.

use schemars::JsonSchema;
use serde::Deserialize;

// ── Enrichment params ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WineIdParams {
    #[schemars(description = "The wine ID")]
    pub wine_id: String,
}

// ── Catalog params ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WineListParams {
    #[schemars(description = "Only wines of this venue")]
    pub venue_id: Option<String>,
    #[schemars(description = "Only wines still missing region, denomination, grapes, or description")]
    pub incomplete_only: Option<bool>,
}
