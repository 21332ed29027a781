//! Prompt construction for the enrichment call

use crate::catalog::{SourceWhitelist, Wine};
use crate::llm::{ChatMessage, ChatRequest};

const SYSTEM_PROMPT: &str = "You are a sommelier assistant with encyclopedic knowledge of \
professional wine guides. You answer only with a single JSON object and never invent \
ratings you are not reasonably sure exist.";

/// Build the chat request asking the model to fill in `wine`.
///
/// Lists every attribute already known, names the descriptive fields that
/// are missing, and fixes the JSON reply schema. Optional reply fields are
/// requested only for attributes the wine lacks.
pub fn build_prompt(wine: &Wine, whitelist: &SourceWhitelist) -> ChatRequest {
    let mut prompt = String::new();

    prompt.push_str("Wine to research:\n");
    prompt.push_str(&format!("- Name: {}\n", wine.name));
    prompt.push_str(&format!("- Category: {}\n", wine.category));
    push_known(&mut prompt, "Producer", wine.producer.as_deref());
    push_known(&mut prompt, "Region", wine.region.as_deref());
    push_known(&mut prompt, "Denomination", wine.denomination.as_deref());
    if let Some(vintage) = wine.vintage {
        prompt.push_str(&format!("- Vintage: {}\n", vintage));
    }
    if !wine.grapes_missing() {
        if let Some(ref grapes) = wine.grape_varieties {
            prompt.push_str(&format!("- Grape varieties: {}\n", grapes.join(", ")));
        }
    }
    push_known(&mut prompt, "Description", wine.description.as_deref());

    let mut missing = Vec::new();
    if wine.region_missing() {
        missing.push("region");
    }
    if wine.denomination_missing() {
        missing.push("denomination");
    }
    if wine.grapes_missing() {
        missing.push("grape_varieties");
    }
    if missing.is_empty() {
        prompt.push_str("\nNo descriptive attributes are missing.\n");
    } else {
        prompt.push_str(&format!("\nMissing attributes: {}\n", missing.join(", ")));
    }

    prompt.push_str("\nRecognized rating sources (use these identifiers for source_id):\n");
    for source in whitelist.sources() {
        prompt.push_str(&format!("- {}: {}\n", source.id, source.name));
    }

    prompt.push_str("\nReply with exactly this JSON structure:\n");
    prompt.push_str(&reply_schema(wine));
    prompt.push_str(
        "\n\nconfidence is your certainty from 0.0 to 1.0 that the rating exists as stated. \
Omit ratings you cannot attribute to a recognized source. year is the guide edition, \
or null if unknown.",
    );

    ChatRequest::new(vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)])
        .with_temperature(0.2)
}

fn push_known(prompt: &mut String, label: &str, value: Option<&str>) {
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        prompt.push_str(&format!("- {}: {}\n", label, v));
    }
}

fn reply_schema(wine: &Wine) -> String {
    let mut fields = vec![
        "  \"ratings\": [\n    {\"source_id\": \"string\", \"source_name\": \"string\", \
\"score\": \"string\", \"confidence\": 0.0, \"year\": 2020}\n  ]"
            .to_string(),
    ];
    if wine.region_missing() {
        fields.push("  \"region\": \"string\"".to_string());
    }
    if wine.denomination_missing() {
        fields.push("  \"denomination\": \"string\"".to_string());
    }
    if wine.grapes_missing() {
        fields.push("  \"grape_varieties\": [\"string\"]".to_string());
    }
    if wine.description_missing() {
        fields.push("  \"tasting_notes\": \"string\"".to_string());
        fields.push("  \"food_pairing\": \"string\"".to_string());
    }
    format!("{{\n{}\n}}", fields.join(",\n"))
}
