//! Decoding the model's reply into a typed payload
//!
//! Models wrap JSON in prose or code fences, so the parser takes the span
//! from the first `{` to the last `}` and decodes that. Field decoding is
//! lenient about shapes models commonly get wrong: numeric scores, string
//! confidences, comma-separated grape lists. A malformed rating entry is
//! dropped on its own; the rest of the payload still applies.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Errors from parsing a model reply. Never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no JSON object found in model reply")]
    NoJsonObject,

    #[error("model reply is not a valid enrichment payload: {0}")]
    InvalidPayload(String),
}

/// A rating as proposed by the model, before filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredRating {
    pub source_id: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(deserialize_with = "score_text")]
    pub score: String,
    /// Clamped into 0.0..=1.0; missing or non-numeric reads as 0.0
    #[serde(default, deserialize_with = "clamped_confidence")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
}

impl InferredRating {
    pub fn new(source_id: impl Into<String>, score: impl Into<String>, confidence: f64) -> Self {
        Self {
            source_id: source_id.into(),
            source_name: None,
            score: score.into(),
            confidence: clamp_confidence(confidence),
            year: None,
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }
}

/// Everything the model may return for one wine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    #[serde(default, deserialize_with = "ratings_or_empty")]
    pub ratings: Vec<InferredRating>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub denomination: Option<String>,
    #[serde(default, deserialize_with = "grape_list")]
    pub grape_varieties: Option<Vec<String>>,
    #[serde(default)]
    pub tasting_notes: Option<String>,
    #[serde(default)]
    pub food_pairing: Option<String>,
}

/// Parse a raw model reply.
pub fn parse_payload(raw: &str) -> Result<EnrichmentPayload, ParseError> {
    let start = raw.find('{').ok_or(ParseError::NoJsonObject)?;
    let end = raw.rfind('}').ok_or(ParseError::NoJsonObject)?;
    if end < start {
        return Err(ParseError::NoJsonObject);
    }

    serde_json::from_str(&raw[start..=end]).map_err(|e| ParseError::InvalidPayload(e.to_string()))
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn ratings_or_empty<'de, D>(deserializer: D) -> Result<Vec<InferredRating>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        other => {
            return Err(D::Error::custom(format!("ratings must be a list, got {}", other)))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<InferredRating>(item) {
            Ok(rating) => Some(rating),
            Err(e) => {
                warn!(error = %e, "dropping malformed rating from model reply");
                None
            }
        })
        .collect())
}

fn score_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("score must be a string or number, got {}", other))),
    }
}

fn clamped_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(clamp_confidence(raw))
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn grape_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let grapes: Vec<String> = match Value::deserialize(deserializer)? {
        Value::Null => return Ok(None),
        Value::String(s) => s.split(',').map(|g| g.trim().to_string()).collect(),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                other => Err(D::Error::custom(format!("grape variety must be a string, got {}", other))),
            })
            .collect::<Result<_, _>>()?,
        other => {
            return Err(D::Error::custom(format!(
                "grape_varieties must be a list or string, got {}",
                other
            )))
        }
    };

    let grapes: Vec<String> = grapes.into_iter().filter(|g| !g.is_empty()).collect();
    Ok(Some(grapes))
}
